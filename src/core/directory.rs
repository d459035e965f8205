use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::config::DirectoryConfig;
use crate::core::AppError;

/// Client for the external identity directory. The portal never implements the
/// directory protocol itself; it only asks "who is this caller and which roles
/// do they hold".
pub struct DirectoryClient {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryIdentity {
    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
}

impl DirectoryClient {
    pub fn new(configuration: &DirectoryConfig) -> Result<Self, anyhow::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(configuration.request_timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            base_url: configuration.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve credentials against the directory. `Ok(None)` means the
    /// directory did not recognise the caller (login falls back to the local
    /// credential check); transport failures are logged and treated the same
    /// way so a directory outage never locks everyone out.
    #[tracing::instrument(name = "Directory Lookup", skip(self, password))]
    pub async fn resolve(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<DirectoryIdentity>, AppError> {
        let url = format!("{}/directory/lookup", self.base_url);

        let response = match self
            .http_client
            .post(&url)
            .json(&LookupRequest { email, password })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Directory lookup failed, falling back to local check: {}", e);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            return Ok(None);
        }

        let identity = response
            .json::<DirectoryIdentity>()
            .await
            .map_err(|e| AppError::internal_error(format!("Malformed directory response: {}", e)))?;

        Ok(Some(identity))
    }
}
