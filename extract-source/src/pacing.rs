//! Global read-budget pacing: when the source reports a provisioned
//! capacity and consumed-capacity units per request, the pool paces itself
//! to stay under `fraction × provisioned_rate` measured over a 10-second
//! sliding window (`spec.md` §4.2).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CapacityPacer {
    provisioned_rate: Option<f64>,
    samples: Mutex<VecDeque<(Instant, f64)>>,
}

impl CapacityPacer {
    pub fn new(provisioned_rate: Option<f64>) -> Self {
        Self {
            provisioned_rate,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Records that a request consumed `units` of capacity.
    pub fn observe(&self, units: f64) {
        let mut samples = self.samples.lock().expect("pacer mutex poisoned");
        samples.push_back((Instant::now(), units));
        prune(&mut samples);
    }

    fn windowed_sum(&self) -> f64 {
        let mut samples = self.samples.lock().expect("pacer mutex poisoned");
        prune(&mut samples);
        samples.iter().map(|(_, units)| units).sum()
    }

    /// Sleeps in short increments until the trailing 10-second consumption
    /// is back under budget. A no-op when no provisioned rate is known
    /// (best-effort per §4.1).
    pub async fn wait_if_over_budget(&self, fraction: f64) {
        let Some(rate) = self.provisioned_rate else {
            return;
        };
        let budget = rate * fraction * WINDOW.as_secs_f64();
        while self.windowed_sum() > budget {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn prune(samples: &mut VecDeque<(Instant, f64)>) {
    let cutoff = Instant::now().checked_sub(WINDOW).unwrap_or_else(Instant::now);
    while let Some((ts, _)) = samples.front() {
        if *ts < cutoff {
            samples.pop_front();
        } else {
            break;
        }
    }
}
