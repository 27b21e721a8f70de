use crate::auth::AccessTokenProvider;
use crate::config::{AccountConfig, Config};
use crate::error::Error;
use crate::report::ReportRequest;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReportingApi: Send + Sync + 'static {
    /// Submits an asynchronous report generation request.
    /// # Returns
    /// The report request ID to poll with.
    async fn submit(&self, request: &ReportRequest) -> Result<String, Error>;

    /// Fetches the current status of a submitted report.
    async fn poll(&self, report_request_id: &str) -> Result<ReportStatus, Error>;

    /// Downloads the zipped report from the URL returned by a successful poll.
    async fn download(&self, download_url: &str) -> Result<Bytes, Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Pending,
    /// The service omits the download URL when the report has no rows.
    Success { download_url: Option<String> },
    Error,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitRequest<'a> {
    report_request: &'a ReportRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitResponse {
    report_request_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PollRequest<'a> {
    report_request_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PollResponse {
    report_request_status: ReportRequestStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReportRequestStatus {
    status: String,
    report_download_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiFault {
    #[serde(default)]
    errors: Vec<ApiFaultError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiFaultError {
    message: String,
}

impl From<PollResponse> for ReportStatus {
    fn from(response: PollResponse) -> Self {
        let status = response.report_request_status;
        match status.status.as_str() {
            "Pending" => ReportStatus::Pending,
            "Success" => ReportStatus::Success {
                download_url: status.report_download_url.filter(|url| !url.is_empty()),
            },
            "Error" => ReportStatus::Error,
            other => {
                warn!("unexpected report status {}", other);
                ReportStatus::Error
            }
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    developer_token: String,
    customer_id: String,
    account_id: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        account: &AccountConfig,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        ApiClient {
            client: Client::new(),
            base_url: config.reporting_url(),
            developer_token: account.developer_token.clone(),
            customer_id: account.customer_id.clone(),
            account_id: account.account_id.to_string(),
            tokens,
        }
    }

    fn endpoint(&self, operation: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .extend(&["GenerateReport", operation]);
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        let access_token = self.tokens.access_token().await?;
        Ok(request
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header("DeveloperToken", &self.developer_token)
            .header("CustomerId", &self.customer_id)
            .header("CustomerAccountId", &self.account_id))
    }
}

/// Turns a non-2xx response into an [`Error::Api`] carrying the service's messages.
async fn check_status(resp: Response) -> Result<Response, Error> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let body = resp.text().await?;
    Err(Error::Api {
        status,
        message: fault_message(&body),
    })
}

fn fault_message(body: &str) -> String {
    match serde_json::from_str::<ApiFault>(body) {
        Ok(fault) if !fault.errors.is_empty() => fault
            .errors
            .into_iter()
            .map(|err| err.message)
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.to_string(),
    }
}

#[async_trait::async_trait]
impl ReportingApi for ApiClient {
    async fn submit(&self, request: &ReportRequest) -> Result<String, Error> {
        let url = self.endpoint("Submit")?;
        let req = self
            .authorized(self.client.post(url))
            .await?
            .json(&SubmitRequest {
                report_request: request,
            });

        let resp = check_status(req.send().await?).await?;
        let submitted: SubmitResponse = resp.json().await?;
        debug!(
            "submitted {} as {}",
            request.report_name, submitted.report_request_id
        );

        Ok(submitted.report_request_id)
    }

    async fn poll(&self, report_request_id: &str) -> Result<ReportStatus, Error> {
        let url = self.endpoint("Poll")?;
        let req = self
            .authorized(self.client.post(url))
            .await?
            .json(&PollRequest { report_request_id });

        let resp = check_status(req.send().await?).await?;
        let polled: PollResponse = resp.json().await?;

        Ok(polled.into())
    }

    async fn download(&self, download_url: &str) -> Result<Bytes, Error> {
        let url = Url::parse(download_url)?;
        let resp = check_status(self.client.get(url).send().await?).await?;

        Ok(resp.bytes().await?)
    }
}
