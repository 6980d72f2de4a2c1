use crate::models::ApiSettings;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Request body of every API call; unknown `api` settings keys stay local
#[derive(Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Errors from the Granblue Automation Statistics API
#[derive(Error, Debug)]
pub enum StatisticsError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {endpoint} was rejected with status {status}")]
    Rejected { endpoint: String, status: StatusCode },
}

/// Outcome of [`StatisticsReporter::report`].
///
/// Nothing in here is propagated as an error; the caller turns it into message
/// log lines and session-flag updates.
#[derive(Debug)]
pub struct ReportOutcome {
    /// Result of the "create item" bootstrap; `None` when it was not attempted
    pub bootstrap: Option<Result<(), StatisticsError>>,

    /// Result of the "create result" call
    pub result: Result<(), StatisticsError>,
}

impl ReportOutcome {
    /// True when this report completed the session's one-time bootstrap.
    pub fn bootstrap_completed(&self) -> bool {
        matches!(self.bootstrap, Some(Ok(())))
    }

    /// Message log lines describing the outcome
    pub fn messages(&self) -> Vec<String> {
        let mut messages = Vec::new();

        if let Some(Err(e)) = &self.bootstrap {
            messages.push(format!("\nFailed to create item for the first time: {}", e));
        }

        match &self.result {
            Ok(()) if self.bootstrap.is_some() => {
                messages.push("\nAPI Request successfully resolved.".to_string())
            }
            Ok(()) => messages.push("\nAPI Request sent.".to_string()),
            Err(e) => messages.push(format!("\nFailed to create result: {}", e)),
        }

        messages
    }
}

/// Client for the Granblue Automation Statistics API.
///
/// The API authenticates with a session cookie set by `/api/login`, so one
/// reporter (and its cookie store) is kept for the whole session. Every call
/// still sends the credentials as its JSON body.
#[derive(Debug, Clone)]
pub struct StatisticsReporter {
    http: Client,
    base_url: Url,
}

impl StatisticsReporter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StatisticsError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StatisticsError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StatisticsError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|source| StatisticsError::Request {
                endpoint: base_url.to_string(),
                source,
            })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in new(): the base URL can hold path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn login_url(&self) -> Url {
        self.endpoint(&["api", "login"])
    }

    pub fn create_item_url(&self, farming_mode: &str, item_name: &str) -> Url {
        self.endpoint(&["api", "create-item", "farmingMode", farming_mode, item_name])
    }

    pub fn create_result_url(
        &self,
        username: &str,
        farming_mode: &str,
        item_name: &str,
        amount: i64,
    ) -> Url {
        let amount = amount.to_string();
        self.endpoint(&[
            "api",
            "create-result",
            username,
            farming_mode,
            item_name,
            "GA",
            &amount,
        ])
    }

    async fn post(&self, url: Url, credentials: &ApiSettings) -> Result<(), StatisticsError> {
        let endpoint = url.path().to_string();
        tracing::debug!("POST {}", endpoint);

        let response = self
            .http
            .post(url)
            .json(&CredentialsBody {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|source| StatisticsError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} responded with {}", endpoint, status);
            return Err(StatisticsError::Rejected { endpoint, status });
        }

        Ok(())
    }

    /// Log in and keep the session cookie for later calls.
    pub async fn login(&self, credentials: &ApiSettings) -> Result<(), StatisticsError> {
        self.post(self.login_url(), credentials).await?;
        tracing::info!("Logged into statistics API as {}", credentials.username);
        Ok(())
    }

    /// Create the item for a farming mode if the API does not know it yet.
    pub async fn create_item(
        &self,
        credentials: &ApiSettings,
        farming_mode: &str,
        item_name: &str,
    ) -> Result<(), StatisticsError> {
        self.post(self.create_item_url(farming_mode, item_name), credentials)
            .await
    }

    /// Record one result for an item.
    pub async fn create_result(
        &self,
        credentials: &ApiSettings,
        farming_mode: &str,
        item_name: &str,
        amount: i64,
    ) -> Result<(), StatisticsError> {
        let url = self.create_result_url(&credentials.username, farming_mode, item_name, amount);
        self.post(url, credentials).await
    }

    /// Report a result, bootstrapping the item first when `first_time` is set.
    ///
    /// A failed bootstrap does not skip the result; the bootstrap stays pending
    /// and is retried with the next report.
    pub async fn report(
        &self,
        credentials: &ApiSettings,
        farming_mode: &str,
        item_name: &str,
        amount: i64,
        first_time: bool,
    ) -> ReportOutcome {
        let bootstrap = if first_time {
            let created = self.create_item(credentials, farming_mode, item_name).await;
            if let Err(e) = &created {
                tracing::error!("Failed to create item for the first time: {}", e);
            }
            Some(created)
        } else {
            None
        };

        let result = self
            .create_result(credentials, farming_mode, item_name, amount)
            .await;
        match &result {
            Ok(()) => tracing::info!("Reported {} x{} for {}", item_name, amount, farming_mode),
            Err(e) => tracing::error!("Failed to create result: {}", e),
        }

        ReportOutcome { bootstrap, result }
    }
}
