use crate::warehouse::WriteDisposition;
use clap::{Args as ClapArgs, ValueEnum};
use std::time::Duration;

const DEFAULT_TENANT_ID: &str = "common";
const TOKENS_FILE: &str = "./tokens.json";
const WAREHOUSE_DIR: &str = "./warehouse";
const DATASET: &str = "msads";
const WORK_DIR: &str = "./reports";

#[derive(ClapArgs, Debug, Clone)]
pub struct Config {
    #[arg(long, env = "CLIENT_ID")]
    pub(crate) client_id: String,

    #[arg(long, env = "CLIENT_SECRET")]
    pub(crate) client_secret: Option<String>,

    #[arg(long, env = "REDIRECT_URI")]
    pub(crate) redirect_uri: Option<String>,

    #[arg(long, default_value = DEFAULT_TENANT_ID, env = "TENANT_ID")]
    pub(crate) tenant_id: String,

    #[arg(long, value_enum, default_value_t = Environment::Production, env = "ENVIRONMENT")]
    pub(crate) environment: Environment,

    /// Overrides the token endpoint of the selected environment
    #[arg(long, env = "TOKEN_URL")]
    pub(crate) token_url: Option<String>,

    /// Overrides the reporting service URL of the selected environment
    #[arg(long, env = "REPORTING_URL")]
    pub(crate) reporting_url: Option<String>,

    #[arg(long, default_value = TOKENS_FILE, env = "TOKENS_FILE")]
    pub(crate) tokens_file: String,

    /// Used only when the tokens file holds no refresh token yet
    #[arg(long, env = "REFRESH_TOKEN", hide_env_values = true)]
    pub(crate) refresh_token: Option<String>,

    #[arg(long, default_value = WAREHOUSE_DIR, env = "WAREHOUSE_DIR")]
    pub(crate) warehouse_dir: String,

    #[arg(long, default_value = DATASET, env = "DATASET")]
    pub(crate) dataset: String,

    #[arg(long, value_enum, default_value_t = WriteDisposition::Append, env = "WRITE_DISPOSITION")]
    pub(crate) write_disposition: WriteDisposition,

    #[arg(long, default_value = WORK_DIR, env = "WORK_DIR")]
    pub(crate) work_dir: String,

    #[arg(long, default_value_t = 5, env = "POLL_INTERVAL_SECS")]
    pub(crate) poll_interval_secs: u64,

    #[arg(long, default_value_t = 600, env = "POLL_TIMEOUT_SECS")]
    pub(crate) poll_timeout_secs: u64,

    #[arg(long, env = "LOG_FILE")]
    pub(crate) log_file: Option<String>,
}

/// Advertiser identity sent with every reporting call. Only `fetch` needs it.
#[derive(ClapArgs, Debug, Clone)]
pub struct AccountConfig {
    #[arg(long, env = "DEVELOPER_TOKEN")]
    pub(crate) developer_token: String,

    #[arg(long, env = "CUSTOMER_ID")]
    pub(crate) customer_id: String,

    #[arg(long, env = "CUSTOMER_ACCOUNT_ID")]
    pub(crate) account_id: i64,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn token_url(&self) -> String {
        self.token_url
            .clone()
            .unwrap_or_else(|| self.environment.token_url(&self.tenant_id))
    }

    pub fn reporting_url(&self) -> String {
        self.reporting_url
            .clone()
            .unwrap_or_else(|| self.environment.reporting_base_url().to_string())
    }
}

/// Microsoft Advertising environment the job talks to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn token_url(&self, tenant_id: &str) -> String {
        match self {
            Environment::Production => format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                tenant_id
            ),
            Environment::Sandbox => {
                "https://login.windows-ppe.net/consumers/oauth2/v2.0/token".to_string()
            }
        }
    }

    pub fn authorize_url(&self, tenant_id: &str) -> String {
        match self {
            Environment::Production => format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
                tenant_id
            ),
            Environment::Sandbox => {
                "https://login.windows-ppe.net/consumers/oauth2/v2.0/authorize".to_string()
            }
        }
    }

    pub fn scope(&self) -> &'static str {
        match self {
            Environment::Production => "https://ads.microsoft.com/msads.manage offline_access",
            Environment::Sandbox => "https://api.ads.microsoft.com/msads.manage offline_access",
        }
    }

    pub fn reporting_base_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://reporting.api.bingads.microsoft.com/Reporting/v13",
            Environment::Sandbox => {
                "https://reporting.api.sandbox.bingads.microsoft.com/Reporting/v13"
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    Config {
        client_id: "client-id".to_string(),
        client_secret: None,
        redirect_uri: Some("http://localhost:8080".to_string()),
        tenant_id: DEFAULT_TENANT_ID.to_string(),
        environment: Environment::Production,
        token_url: None,
        reporting_url: None,
        tokens_file: root.join("tokens.json").to_string_lossy().into_owned(),
        refresh_token: None,
        warehouse_dir: root.join("warehouse").to_string_lossy().into_owned(),
        dataset: DATASET.to_string(),
        write_disposition: WriteDisposition::Append,
        work_dir: root.join("reports").to_string_lossy().into_owned(),
        poll_interval_secs: 0,
        poll_timeout_secs: 1,
        log_file: None,
    }
}

#[cfg(test)]
pub(crate) fn test_account() -> AccountConfig {
    AccountConfig {
        developer_token: "dev-token".to_string(),
        customer_id: "111".to_string(),
        account_id: 222,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_token_url_uses_tenant() {
        assert_eq!(
            Environment::Production.token_url("contoso"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_sandbox_ignores_tenant() {
        assert_eq!(
            Environment::Sandbox.token_url("contoso"),
            "https://login.windows-ppe.net/consumers/oauth2/v2.0/token"
        );
        assert!(Environment::Sandbox
            .reporting_base_url()
            .contains("sandbox"));
    }

    #[test]
    fn test_endpoint_overrides() {
        let mut config = test_config(std::path::Path::new("/tmp"));
        assert_eq!(
            config.reporting_url(),
            "https://reporting.api.bingads.microsoft.com/Reporting/v13"
        );

        config.token_url = Some("http://127.0.0.1:9000/token".to_string());
        config.reporting_url = Some("http://127.0.0.1:9000".to_string());
        assert_eq!(config.token_url(), "http://127.0.0.1:9000/token");
        assert_eq!(config.reporting_url(), "http://127.0.0.1:9000");
    }
}
