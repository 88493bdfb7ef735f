//! Bucket and key naming (`spec.md` §4.4): a client's output bucket is
//! derived from its `client_id` and a configured prefix; the object key
//! is derived from the run's window. Two distinct client IDs can
//! normalize to the same bucket name — the spec accepts this collision
//! rather than rejecting it (see `DESIGN.md`).

use sha2::{Digest, Sha256};

use extract_core::model::{OutputFormat, Window};

const MAX_BUCKET_LEN: usize = 63;
const HASH_SUFFIX_LEN: usize = 8;

/// Normalizes `client_id` into a valid S3 bucket name segment: lowercase,
/// non-`[a-z0-9-]` characters replaced with `-`, leading/trailing hyphens
/// trimmed. Names that would exceed the bucket length limit once prefixed
/// are truncated with a deterministic hash suffix so distinct long client
/// IDs sharing a truncated prefix don't silently collide undetected.
pub fn bucket_name(prefix: &str, client_id: &str) -> String {
    let normalized = normalize(client_id);
    let candidate = format!("{prefix}-{normalized}");
    if candidate.len() <= MAX_BUCKET_LEN {
        return candidate;
    }

    let hash = hex_prefix(client_id, HASH_SUFFIX_LEN);
    // "{prefix}-{kept}-{hash}": two separators plus the hash suffix are
    // fixed overhead. Clamp an overlong prefix first so the final name
    // still conforms to the length limit even when `prefix` alone would
    // otherwise exceed it.
    let fixed_overhead = 2 + HASH_SUFFIX_LEN;
    let prefix_budget = MAX_BUCKET_LEN.saturating_sub(fixed_overhead).max(1);
    let prefix = &prefix[..prefix_budget.min(prefix.len())];
    let keep = MAX_BUCKET_LEN
        .saturating_sub(prefix.len())
        .saturating_sub(fixed_overhead);
    format!("{prefix}-{}-{hash}", &normalized[..keep.min(normalized.len())])
}

fn normalize(client_id: &str) -> String {
    let mapped: String = client_id
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    mapped.trim_matches('-').to_string()
}

fn hex_prefix(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    hex[..len.min(hex.len())].to_string()
}

/// The object key for one client's chunk within a run's window:
/// `events-{window}.{ext}` for the common single-chunk case, with a
/// `-{chunk_index}` suffix once a client has spilled past the first chunk
/// under high-water-mark pressure (`spec.md` §4.4: "a stable `(bucket, key)`
/// that includes a chunk suffix").
pub fn object_key(window: &Window, chunk_index: u32, format: OutputFormat) -> String {
    if chunk_index == 0 {
        format!("events-{}.{}", window.key_fragment(), format.extension())
    } else {
        format!(
            "events-{}-{chunk_index}.{}",
            window.key_fragment(),
            format.extension()
        )
    }
}
