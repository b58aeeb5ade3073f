use super::{BookingApi, Result, UpstreamError};
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use thais_types::{Availability, LoginRequest, LoginResponse, RoomType};
use tracing::debug;

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// HTTP client for the Thais partner REST API
#[derive(Clone)]
pub struct ThaisClient {
    base_url: String,
    credentials: Option<Credentials>,
    client: Client,
}

impl std::fmt::Debug for ThaisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThaisClient")
            .field("base_url", &self.base_url)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

impl ThaisClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

#[async_trait]
impl BookingApi for ThaisClient {
    async fn authenticate(&self) -> Result<String> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(UpstreamError::MissingCredentials)?;

        let url = self.url("/login")?;
        debug!("Authenticating against {}", url);

        let response = self
            .client
            .post(url)
            .json(&LoginRequest {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::AuthRejected(response.status()));
        }

        let login: LoginResponse = response.json().await?;
        Ok(login.token)
    }

    async fn fetch_availability(
        &self,
        from: &str,
        to: &str,
        token: &str,
    ) -> Result<Vec<Availability>> {
        let mut url = self.url("/hotel/apr/availabilities/currents")?;
        url.query_pairs_mut()
            .append_pair("from", from)
            .append_pair("to", to);
        debug!("Fetching availability from {} to {}", from, to);

        let response = self.client.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Availability(response.status()));
        }

        Ok(response.json().await?)
    }

    async fn fetch_room_types(&self, token: &str) -> Result<Vec<RoomType>> {
        let url = self.url("/hotel/room-types")?;
        debug!("Fetching room types");

        let response = self.client.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(UpstreamError::RoomTypes(response.status()));
        }

        Ok(response.json().await?)
    }
}
