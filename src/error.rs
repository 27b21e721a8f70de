use datafusion::{arrow::error::ArrowError, error::DataFusionError};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("DataFusion: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Arrow: {0}")]
    Arrow(#[from] ArrowError),

    #[error("The start date: '{start_date}' is greater than the end date: '{end_date}'")]
    StartDateAfterEndDate {
        start_date: String,
        end_date: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to extract report archive: {0}")]
    Unzip(#[from] zip_extract::ZipExtractError),

    #[error("Reporting API responded with {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("OAuth token request failed: {error}: {description}")]
    OAuth { error: String, description: String },

    #[error("No refresh token available, run `redeem` or set REFRESH_TOKEN")]
    MissingRefreshToken,

    #[error("Report request {report_request_id} finished with status Error")]
    ReportFailed { report_request_id: String },

    #[error("Report request {report_request_id} was not ready after {waited_secs}s")]
    PollTimeout {
        report_request_id: String,
        waited_secs: u64,
    },

    #[error("Report archive contains no CSV file")]
    NoCsvInArchive,

    #[error("{} report(s) failed: {}", .reports.len(), .reports.join(", "))]
    ReportsFailed { reports: Vec<String> },
}
