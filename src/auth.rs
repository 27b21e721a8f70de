use crate::config::Config;
use crate::error::Error;
use chrono::Utc;
use log::{error, info};
use reqwest::Client;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use url::Url;

/// Access tokens closer than this to expiry are refreshed before use.
const EXPIRY_LEEWAY_SECS: i64 = 60;

const STATE_LENGTH: usize = 30;

/// Tokens persisted between runs. Missing or null tokens read as empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub access_token: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which `access_token` expires.
    #[serde(alias = "exprires_at", default)]
    pub expires_at: i64,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl TokenSet {
    pub fn is_fresh(&self, now: i64) -> bool {
        !self.access_token.is_empty() && self.expires_at > now + EXPIRY_LEEWAY_SECS
    }
}

pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    /// Reads the tokens file. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<TokenSet> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                error!("failed to read tokens file {}: {}", self.path.display(), err);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(tokens) => Some(tokens),
            Err(err) => {
                error!("failed to parse tokens file {}: {}", self.path.display(), err);
                None
            }
        }
    }

    pub fn save(&self, tokens: &TokenSet) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(tokens)?)?;
        Ok(())
    }
}

/// Response of the identity platform token endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenEndpoint: Send + Sync + 'static {
    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error>;

    /// Exchanges an authorization code obtained from the consent page.
    async fn redeem_code(&self, code: &str) -> Result<TokenResponse, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccessTokenProvider: Send + Sync + 'static {
    async fn access_token(&self) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct OAuthClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    scope: String,
}

impl OAuthClient {
    pub fn new(config: &Config) -> Self {
        OAuthClient {
            client: Client::new(),
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.environment.scope().to_string(),
        }
    }

    fn form<'a>(&'a self, grant: [(&'a str, &'a str); 2]) -> Vec<(&'a str, &'a str)> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("scope", self.scope.as_str()),
        ];
        form.extend(grant);
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        if let Some(redirect_uri) = &self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }
        form
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let resp = self.client.post(&self.token_url).form(form).send().await?;

        if resp.status().is_success() {
            return Ok(resp.json::<TokenResponse>().await?);
        }

        let status = resp.status();
        let body = resp.text().await?;
        Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => Error::OAuth {
                error: err.error,
                description: err.error_description,
            },
            Err(_) => Error::OAuth {
                error: status.to_string(),
                description: body,
            },
        })
    }
}

#[async_trait::async_trait]
impl TokenEndpoint for OAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error> {
        let form = self.form([
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        self.request_tokens(&form).await
    }

    async fn redeem_code(&self, code: &str) -> Result<TokenResponse, Error> {
        let form = self.form([("grant_type", "authorization_code"), ("code", code)]);
        self.request_tokens(&form).await
    }
}

/// Serves access tokens from the tokens file, refreshing them when stale.
pub struct CachedTokenProvider<E: TokenEndpoint> {
    endpoint: E,
    store: TokenStore,
    seed_refresh_token: Option<String>,
}

impl<E: TokenEndpoint> CachedTokenProvider<E> {
    pub fn new(endpoint: E, store: TokenStore, seed_refresh_token: Option<String>) -> Self {
        CachedTokenProvider {
            endpoint,
            store,
            seed_refresh_token,
        }
    }

    /// Redeems an authorization code and persists the resulting tokens.
    pub async fn redeem_code(&self, code: &str) -> Result<TokenSet, Error> {
        let response = self.endpoint.redeem_code(code).await?;
        let tokens = into_token_set(response, None, Utc::now().timestamp())?;
        self.store.save(&tokens)?;
        Ok(tokens)
    }

    async fn refresh(&self, stored: Option<TokenSet>) -> Result<String, Error> {
        let refresh_token = stored
            .map(|tokens| tokens.refresh_token)
            .filter(|token| !token.is_empty())
            .or_else(|| self.seed_refresh_token.clone())
            .ok_or(Error::MissingRefreshToken)?;

        info!("refreshing access token");
        let response = self.endpoint.refresh(&refresh_token).await?;
        let tokens = into_token_set(response, Some(refresh_token), Utc::now().timestamp())?;

        if let Err(err) = self.store.save(&tokens) {
            error!("failed to save tokens: {}", err);
        }

        Ok(tokens.access_token)
    }
}

#[async_trait::async_trait]
impl<E: TokenEndpoint> AccessTokenProvider for CachedTokenProvider<E> {
    async fn access_token(&self) -> Result<String, Error> {
        let stored = self.store.load();

        if let Some(tokens) = &stored {
            if tokens.is_fresh(Utc::now().timestamp()) {
                return Ok(tokens.access_token.clone());
            }
        }

        self.refresh(stored).await
    }
}

/// The endpoint only rotates refresh tokens sometimes; keep the previous one otherwise.
fn into_token_set(
    response: TokenResponse,
    previous_refresh_token: Option<String>,
    now: i64,
) -> Result<TokenSet, Error> {
    let refresh_token = response
        .refresh_token
        .or(previous_refresh_token)
        .ok_or(Error::MissingRefreshToken)?;

    Ok(TokenSet {
        access_token: response.access_token,
        refresh_token,
        expires_at: now + response.expires_in,
    })
}

/// Random value echoed back by the consent page, used to match the redirect to this request.
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Consent page URL for obtaining the first authorization code.
pub fn authorization_url(config: &Config, state: &str) -> Result<Url, Error> {
    let mut url = Url::parse(&config.environment.authorize_url(&config.tenant_id))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &config.client_id)
            .append_pair("scope", config.environment.scope())
            .append_pair("response_type", "code");
        if let Some(redirect_uri) = &config.redirect_uri {
            query.append_pair("redirect_uri", redirect_uri);
        }
        query
            .append_pair("state", state)
            .append_pair("prompt", "login");
    }
    Ok(url)
}
