//! The explicit context value threaded through one invocation, replacing
//! the ad-hoc global state the teacher's `main.rs` avoids the same way
//! (`spec.md` §9: "Ad-hoc global state ... collect these into one
//! explicit context struct").

use std::sync::Arc;

use extract_config::Config;
use extract_core::telemetry::Telemetry;
use extract_sink::SinkStore;
use extract_source::SourceStore;

pub struct RunContext {
    pub config: Config,
    pub source: Arc<dyn SourceStore>,
    pub sink: Arc<dyn SinkStore>,
    pub telemetry: Arc<dyn Telemetry>,
}

impl RunContext {
    pub fn new(
        config: Config,
        source: Arc<dyn SourceStore>,
        sink: Arc<dyn SinkStore>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            telemetry,
        }
    }
}
