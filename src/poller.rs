use crate::api_client::{ReportStatus, ReportingApi};
use crate::error::Error;
use log::debug;
use std::time::{Duration, Instant};

/// Polls a submitted report at a fixed interval until it leaves `Pending`.
///
/// # Returns
/// The download URL of the finished report, or `None` when the report is empty.
pub async fn wait_for_report(
    api: &dyn ReportingApi,
    report_request_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<Option<String>, Error> {
    let started = Instant::now();

    loop {
        match api.poll(report_request_id).await? {
            ReportStatus::Success { download_url } => return Ok(download_url),
            ReportStatus::Error => {
                return Err(Error::ReportFailed {
                    report_request_id: report_request_id.to_string(),
                })
            }
            ReportStatus::Pending => {
                if started.elapsed() >= timeout {
                    return Err(Error::PollTimeout {
                        report_request_id: report_request_id.to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
                debug!("report {} still pending", report_request_id);
                tokio::time::sleep(interval).await;
            }
        }
    }
}
