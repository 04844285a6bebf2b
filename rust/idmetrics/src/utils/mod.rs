pub mod chem;

use std::time::Duration;

/// Elapsed wall time in seconds with two decimals, for run diagnostics.
pub fn time_cost_secs(elapsed: Duration) -> String {
    format!("{:.2}", elapsed.as_secs_f64())
}
