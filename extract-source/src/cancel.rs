//! Re-exported from `extract-core` so both the Reader and the Writer share
//! the exact same cancellation signal type without `extract-sink` having to
//! depend on `extract-source`.

pub use extract_core::cancel::CancelToken;
