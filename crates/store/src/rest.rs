//! [`RecordStore`] backed by a hosted PostgREST API.
//!
//! Balances live in the `users` table (`id`, `credits`) and successful
//! generations are inserted into `image_generations`.

use async_trait::async_trait;
use imagegen_core::types::Credits;
use imagegen_core::{ConfigError, GenerationRecord};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::error::StoreError;
use crate::records::RecordStore;

/// How many times a deduction re-reads the balance after losing a race.
const MAX_DEDUCT_ATTEMPTS: u32 = 3;

const USERS_TABLE: &str = "users";
const GENERATIONS_TABLE: &str = "image_generations";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Public API key, sent as `apikey`.
    pub api_key: String,
    /// Signed-in user's access token. Falls back to the API key.
    pub access_token: Option<String>,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when neither variable is set: the backend is
    /// optional and its absence means unmetered operation.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `SUPABASE_URL`          | (none)  |
    /// | `SUPABASE_ANON_KEY`     | (none)  |
    /// | `SUPABASE_ACCESS_TOKEN` | (none)  |
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let (base_url, api_key) = match (read("SUPABASE_URL"), read("SUPABASE_ANON_KEY")) {
            (None, None) => return Ok(None),
            (Some(url), Some(key)) => (url, key),
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_ANON_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
        };

        reqwest::Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
            name: "SUPABASE_URL",
            reason: e.to_string(),
        })?;

        Ok(Some(Self {
            base_url,
            api_key,
            access_token: read("SUPABASE_ACCESS_TOKEN"),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct CreditsRow {
    credits: Credits,
}

/// PostgREST client for credits and generation records.
pub struct RestRecordStore {
    client: reqwest::Client,
    config: RestStoreConfig,
}

impl RestRecordStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .default_headers(auth_headers(&config)?)
            .build()?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url.trim_end_matches('/'))
    }

    /// Conditionally write `new_balance` only if the row still holds
    /// `expected`. Returns `false` when another writer got there first.
    async fn compare_and_set(
        &self,
        user_id: &str,
        expected: Credits,
        new_balance: Credits,
    ) -> Result<bool, StoreError> {
        let response = self
            .client
            .patch(self.table_url(USERS_TABLE))
            .query(&[
                ("id", format!("eq.{user_id}")),
                ("credits", format!("eq.{expected}")),
                ("select", "credits".to_string()),
            ])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "credits": new_balance }))
            .send()
            .await?;
        let rows: Vec<CreditsRow> = ensure_success(response).await?.json().await?;
        Ok(!rows.is_empty())
    }
}

fn auth_headers(config: &RestStoreConfig) -> Result<HeaderMap, StoreError> {
    let invalid = |e: reqwest::header::InvalidHeaderValue| {
        StoreError::Config(ConfigError::Invalid {
            name: "SUPABASE_ANON_KEY",
            reason: e.to_string(),
        })
    };
    let bearer = config.access_token.as_deref().unwrap_or(&config.api_key);

    let mut headers = HeaderMap::new();
    headers.insert("apikey", HeaderValue::from_str(&config.api_key).map_err(invalid)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {bearer}")).map_err(invalid)?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Check that a response has a 2xx status, or extract the error body.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn get_credits(&self, user_id: &str) -> Result<Credits, StoreError> {
        let response = self
            .client
            .get(self.table_url(USERS_TABLE))
            .query(&[("id", format!("eq.{user_id}")), ("select", "credits".to_string())])
            .send()
            .await?;
        let rows: Vec<CreditsRow> = ensure_success(response).await?.json().await?;
        rows.first()
            .map(|row| row.credits)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }

    async fn deduct_credits(&self, user_id: &str, amount: Credits) -> Result<Credits, StoreError> {
        for attempt in 1..=MAX_DEDUCT_ATTEMPTS {
            let current = self.get_credits(user_id).await?;
            let Some(remaining) = current.checked_sub(amount) else {
                return Err(StoreError::InsufficientCredits {
                    required: amount,
                    available: current,
                });
            };

            if self.compare_and_set(user_id, current, remaining).await? {
                tracing::debug!(user_id, amount, remaining, "Credits deducted");
                return Ok(remaining);
            }

            tracing::debug!(user_id, attempt, "Balance changed during deduction, retrying");
        }

        Err(StoreError::Conflict(format!(
            "balance for {user_id} changed {MAX_DEDUCT_ATTEMPTS} times during deduction"
        )))
    }

    async fn save_generation(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.table_url(GENERATIONS_TABLE))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
