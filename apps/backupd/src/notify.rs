use backup_core::WarningSchedule;
use tokio::time::sleep;
use tracing::warn;

use crate::orchestrator::ServerChannel;

/// Walk the warning timeline, pausing between scheduled moments. Delivery
/// is best-effort: a failed send is logged and the walk continues, since a
/// flaky chat channel must never cost us the backup. Returns once the
/// final offset has elapsed, i.e. at the quiesce point.
pub async fn run_schedule<C: ServerChannel>(channel: &C, schedule: &WarningSchedule) {
    for (wait, warning) in schedule.timeline() {
        if !wait.is_zero() {
            sleep(wait).await;
        }
        if let Some(warning) = warning {
            if let Err(err) = channel.notify(&warning.message).await {
                warn!(
                    offset_secs = warning.offset.as_secs(),
                    "warning delivery failed: {err:#}"
                );
            }
        }
    }
}
