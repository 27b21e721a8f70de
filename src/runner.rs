use crate::api_client::{ApiClient, ReportingApi};
use crate::archive::extract_csv;
use crate::auth::{AccessTokenProvider, CachedTokenProvider, OAuthClient, TokenStore};
use crate::config::{AccountConfig, Config};
use crate::data::report_schema;
use crate::error::Error;
use crate::poller::wait_for_report;
use crate::report::{ReportRequest, ReportType};
use crate::warehouse::{LoadJob, ParquetWarehouse, Warehouse};
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct RunSettings {
    pub account_id: i64,
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl RunSettings {
    pub fn new(config: &Config, account: &AccountConfig) -> Self {
        RunSettings {
            account_id: account.account_id,
            work_dir: PathBuf::from(&config.work_dir),
            poll_interval: config.poll_interval(),
            poll_timeout: config.poll_timeout(),
        }
    }
}

pub async fn load_reports(
    config: Config,
    account: AccountConfig,
    reports: &[ReportType],
    start: &NaiveDate,
    end: &NaiveDate,
) -> Result<(), Error> {
    let tokens: Arc<dyn AccessTokenProvider> = Arc::new(CachedTokenProvider::new(
        OAuthClient::new(&config),
        TokenStore::new(&config.tokens_file),
        config.refresh_token.clone(),
    ));
    let api_client = ApiClient::new(&config, &account, tokens.clone());
    let warehouse = ParquetWarehouse::new(&config);

    run_reports(
        &api_client,
        &warehouse,
        tokens.as_ref(),
        &RunSettings::new(&config, &account),
        reports,
        start,
        end,
    )
    .await
}

/// Runs submit, poll, download, unzip and load for each report type in turn.
///
/// A failing report is logged and skipped; the run fails at the end if any did.
/// Credentials are resolved once up front, so a missing or rejected refresh
/// token fails the run before any report is submitted.
pub async fn run_reports(
    api: &dyn ReportingApi,
    warehouse: &dyn Warehouse,
    tokens: &dyn AccessTokenProvider,
    settings: &RunSettings,
    reports: &[ReportType],
    start: &NaiveDate,
    end: &NaiveDate,
) -> Result<(), Error> {
    if start > end {
        return Err(Error::StartDateAfterEndDate {
            start_date: start.to_string(),
            end_date: end.to_string(),
        });
    }

    tokens.access_token().await?;

    let label = format!("{}_{}_{}", start, end, Utc::now().format("%Y%m%dT%H%M%S"));
    let mut failed = vec![];

    for report_type in reports {
        info!("[{}] starting report for {} to {}", report_type, start, end);

        match run_report(api, warehouse, settings, *report_type, start, end, &label).await {
            Ok(rows) => info!("[{}] done, {} rows loaded", report_type, rows),
            Err(err) => {
                error!("[{}] failed: {}", report_type, err);
                failed.push(report_type.to_string());
            }
        }
    }

    if !failed.is_empty() {
        return Err(Error::ReportsFailed { reports: failed });
    }

    Ok(())
}

async fn run_report(
    api: &dyn ReportingApi,
    warehouse: &dyn Warehouse,
    settings: &RunSettings,
    report_type: ReportType,
    start: &NaiveDate,
    end: &NaiveDate,
    label: &str,
) -> Result<usize, Error> {
    let request = ReportRequest::new(report_type, settings.account_id, start, end);
    let report_request_id = api.submit(&request).await?;
    info!("[{}] submitted as {}", report_type, report_request_id);

    let download_url = match wait_for_report(
        api,
        &report_request_id,
        settings.poll_interval,
        settings.poll_timeout,
    )
    .await?
    {
        Some(url) => url,
        None => {
            warn!("[{}] report has no data", report_type);
            return Ok(0);
        }
    };

    let archive = api.download(&download_url).await?;

    let extract_dir = settings.work_dir.join(report_type.table());
    if extract_dir.exists() {
        fs::remove_dir_all(&extract_dir)?;
    }
    let csv_path = extract_csv(&archive, &extract_dir)?;

    let rows = warehouse
        .load_csv(&LoadJob {
            table: report_type.table().to_string(),
            schema: report_schema(report_type),
            source: csv_path,
            label: label.to_string(),
        })
        .await?;

    if let Err(err) = fs::remove_dir_all(&extract_dir) {
        warn!(
            "[{}] could not remove {}: {}",
            report_type,
            extract_dir.display(),
            err
        );
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{MockReportingApi, ReportStatus};
    use crate::auth::MockAccessTokenProvider;
    use crate::archive::tests::make_zip;
    use crate::warehouse::MockWarehouse;
    use bytes::Bytes;
    use mockall::predicate::eq;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> RunSettings {
        RunSettings {
            account_id: 222,
            work_dir: dir.path().join("reports"),
            poll_interval: Duration::from_millis(1),
            poll_timeout: Duration::from_secs(5),
        }
    }

    fn tokens() -> MockAccessTokenProvider {
        let mut tokens = MockAccessTokenProvider::new();
        tokens
            .expect_access_token()
            .times(1)
            .returning(|| Ok("token".to_string()));
        tokens
    }

    fn dates() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_str("2024-01-01").unwrap(),
            NaiveDate::from_str("2024-01-31").unwrap(),
        )
    }

    fn report_archive() -> Bytes {
        Bytes::from(make_zip(&[(
            "report.csv",
            "\"TimePeriod\",\"AccountId\"\n\"2024-01-01\",\"222\"\n",
        )]))
    }

    #[tokio::test]
    async fn test_start_after_end() {
        let dir = TempDir::new().unwrap();
        let (start, end) = dates();

        let result = run_reports(
            &MockReportingApi::new(),
            &MockWarehouse::new(),
            &MockAccessTokenProvider::new(),
            &settings(&dir),
            &ReportType::ALL,
            &end,
            &start,
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::StartDateAfterEndDate { .. }
        ));
    }

    #[tokio::test]
    async fn test_report_routed_to_its_table() {
        let dir = TempDir::new().unwrap();
        let (start, end) = dates();

        let mut api = MockReportingApi::new();
        api.expect_submit()
            .withf(|request| request.request_type == "AdGroupPerformanceReportRequest")
            .times(1)
            .returning(|_| Ok("req-1".to_string()));
        api.expect_poll().with(eq("req-1")).returning(|_| {
            Ok(ReportStatus::Success {
                download_url: Some("https://download/req-1.zip".to_string()),
            })
        });
        api.expect_download()
            .with(eq("https://download/req-1.zip"))
            .returning(|_| Ok(report_archive()));

        let mut warehouse = MockWarehouse::new();
        warehouse
            .expect_load_csv()
            .withf(|job| {
                job.table == "ad_group_performance"
                    && job.source.ends_with("report.csv")
                    && job.source.exists()
                    && job.label.starts_with("2024-01-01_2024-01-31_")
            })
            .times(1)
            .returning(|_| Ok(1));

        let settings = settings(&dir);
        run_reports(
            &api,
            &warehouse,
            &tokens(),
            &settings,
            &[ReportType::AdGroup],
            &start,
            &end,
        )
            .await
            .unwrap();

        assert!(!settings.work_dir.join("ad_group_performance").exists());
    }

    #[tokio::test]
    async fn test_empty_report_is_not_downloaded() {
        let dir = TempDir::new().unwrap();
        let (start, end) = dates();

        let mut api = MockReportingApi::new();
        api.expect_submit().returning(|_| Ok("req-1".to_string()));
        api.expect_poll()
            .returning(|_| Ok(ReportStatus::Success { download_url: None }));
        api.expect_download().never();

        let mut warehouse = MockWarehouse::new();
        warehouse.expect_load_csv().never();

        run_reports(
            &api,
            &warehouse,
            &tokens(),
            &settings(&dir),
            &[ReportType::Campaign],
            &start,
            &end,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failed_report_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let (start, end) = dates();

        let mut api = MockReportingApi::new();
        api.expect_submit().returning(|request| {
            if request.request_type == "CampaignPerformanceReportRequest" {
                Err(Error::Api {
                    status: reqwest::StatusCode::BAD_REQUEST,
                    message: "Invalid column".to_string(),
                })
            } else {
                Ok("req-2".to_string())
            }
        });
        api.expect_poll().returning(|_| {
            Ok(ReportStatus::Success {
                download_url: Some("https://download/req-2.zip".to_string()),
            })
        });
        api.expect_download().returning(|_| Ok(report_archive()));

        let mut warehouse = MockWarehouse::new();
        warehouse
            .expect_load_csv()
            .withf(|job| job.table == "account_performance")
            .times(1)
            .returning(|_| Ok(1));

        let result = run_reports(
            &api,
            &warehouse,
            &tokens(),
            &settings(&dir),
            &[ReportType::Campaign, ReportType::Account],
            &start,
            &end,
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::ReportsFailed { reports } if reports == vec!["campaign_performance".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_extracted_csv() {
        let dir = TempDir::new().unwrap();
        let (start, end) = dates();

        let mut api = MockReportingApi::new();
        api.expect_submit().returning(|_| Ok("req-1".to_string()));
        api.expect_poll().returning(|_| {
            Ok(ReportStatus::Success {
                download_url: Some("https://download/req-1.zip".to_string()),
            })
        });
        api.expect_download().returning(|_| Ok(report_archive()));

        let mut warehouse = MockWarehouse::new();
        warehouse
            .expect_load_csv()
            .returning(|_| Err(Error::NoCsvInArchive));

        let settings = settings(&dir);
        let result = run_reports(
            &api,
            &warehouse,
            &tokens(),
            &settings,
            &[ReportType::Ad],
            &start,
            &end,
        )
        .await;

        assert!(result.is_err());
        assert!(settings
            .work_dir
            .join("ad_performance")
            .join("report.csv")
            .exists());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_before_any_report() {
        let dir = TempDir::new().unwrap();
        let (start, end) = dates();

        let mut tokens = MockAccessTokenProvider::new();
        tokens
            .expect_access_token()
            .times(1)
            .returning(|| Err(Error::MissingRefreshToken));

        let mut api = MockReportingApi::new();
        api.expect_submit().never();
        let mut warehouse = MockWarehouse::new();
        warehouse.expect_load_csv().never();

        let result = run_reports(
            &api,
            &warehouse,
            &tokens,
            &settings(&dir),
            &ReportType::ALL,
            &start,
            &end,
        )
        .await;

        assert!(matches!(result.unwrap_err(), Error::MissingRefreshToken));
    }
}
