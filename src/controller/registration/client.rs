//! # Aggregator Client
//!
//! Application registrations on the aggregator's REST API. Registration is
//! keyed by application name: registering an existing name updates it in
//! place, unregistering a missing name is a no-op.

use crate::controller::registration::RegistrationError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroize;

/// One field of an application's settings, as the aggregator models it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// An application registered on the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRegistration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub implementation: String,
    #[serde(default)]
    pub config_contract: String,
    #[serde(default)]
    pub sync_level: String,
    #[serde(default)]
    pub fields: Vec<RegistrationField>,
    #[serde(default)]
    pub tags: Vec<i64>,
}

impl ApplicationRegistration {
    /// Registration payload for a downstream service pulled into the aggregator
    pub fn for_service(
        name: &str,
        implementation: &str,
        aggregator_url: &str,
        service_url: &str,
        api_key: &str,
        sync_level: &str,
        sync_categories: &[i32],
    ) -> Self {
        let field = |name: &str, value: Value| RegistrationField {
            name: name.to_string(),
            value: Some(value),
        };
        Self {
            id: None,
            name: name.to_string(),
            implementation: implementation.to_string(),
            config_contract: format!("{implementation}Settings"),
            sync_level: sync_level.to_string(),
            fields: vec![
                field("prowlarrUrl", json!(aggregator_url)),
                field("baseUrl", json!(service_url)),
                field("apiKey", json!(api_key)),
                field("syncCategories", json!(sync_categories)),
            ],
            tags: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_ref())
    }
}

#[async_trait]
pub trait AggregatorClient: Send + Sync {
    async fn list_applications(&self) -> Result<Vec<ApplicationRegistration>, RegistrationError>;

    async fn find_application(
        &self,
        name: &str,
    ) -> Result<Option<ApplicationRegistration>, RegistrationError> {
        Ok(self
            .list_applications()
            .await?
            .into_iter()
            .find(|app| app.name == name))
    }

    async fn create_application(
        &self,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError>;

    async fn update_application(
        &self,
        id: i64,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError>;

    async fn delete_application(&self, id: i64) -> Result<(), RegistrationError>;

    /// Create, or update the registration already holding this name
    async fn register_application(
        &self,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError> {
        match self.find_application(&app.name).await? {
            Some(ApplicationRegistration {
                id: Some(id),
                tags,
                ..
            }) => {
                let mut updated = app.clone();
                updated.id = Some(id);
                updated.tags = tags;
                self.update_application(id, &updated).await
            }
            _ => self.create_application(app).await,
        }
    }

    /// Returns whether anything was removed
    async fn unregister_application(&self, name: &str) -> Result<bool, RegistrationError> {
        match self.find_application(name).await? {
            Some(ApplicationRegistration { id: Some(id), .. }) => {
                self.delete_application(id).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Builds clients for a given aggregator endpoint
pub trait AggregatorClientFactory: Send + Sync {
    fn client(&self, base_url: &str, api_key: &str, timeout: Duration) -> Arc<dyn AggregatorClient>;
}

/// [`AggregatorClient`] for Prowlarr's `/api/v1/applications` endpoint
pub struct ProwlarrClient {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl Drop for ProwlarrClient {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl std::fmt::Debug for ProwlarrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProwlarrClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProwlarrClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn url(&self, id: Option<i64>) -> String {
        let base = format!("{}/api/v1/applications", self.base_url.trim_end_matches('/'));
        match id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Api-Key", &self.api_key)
            .timeout(self.timeout)
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, RegistrationError> {
        debug!(method = %method, url = %url, "aggregator.request");
        let response = request
            .send()
            .await
            .map_err(|source| RegistrationError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(url = %url, error = %e, "aggregator.error_body_unreadable");
                String::new()
            }
        };
        Err(RegistrationError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        url: String,
        request: RequestBuilder,
    ) -> Result<T, RegistrationError> {
        let response = self.send(method, url.clone(), request).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| RegistrationError::Http { url, source })
    }
}

#[async_trait]
impl AggregatorClient for ProwlarrClient {
    async fn list_applications(&self) -> Result<Vec<ApplicationRegistration>, RegistrationError> {
        let url = self.url(None);
        self.send_json(Method::GET, url.clone(), self.request(Method::GET, &url))
            .await
    }

    async fn create_application(
        &self,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError> {
        let url = self.url(None);
        self.send_json(
            Method::POST,
            url.clone(),
            self.request(Method::POST, &url).json(app),
        )
        .await
    }

    async fn update_application(
        &self,
        id: i64,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError> {
        let url = self.url(Some(id));
        self.send_json(
            Method::PUT,
            url.clone(),
            self.request(Method::PUT, &url).json(app),
        )
        .await
    }

    async fn delete_application(&self, id: i64) -> Result<(), RegistrationError> {
        let url = self.url(Some(id));
        self.send(Method::DELETE, url.clone(), self.request(Method::DELETE, &url))
            .await
            .map(drop)
    }
}

/// Hands out [`ProwlarrClient`]s sharing one connection pool
#[derive(Debug, Clone)]
pub struct ProwlarrClientFactory {
    http: Client,
}

impl ProwlarrClientFactory {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl AggregatorClientFactory for ProwlarrClientFactory {
    fn client(&self, base_url: &str, api_key: &str, timeout: Duration) -> Arc<dyn AggregatorClient> {
        Arc::new(ProwlarrClient::new(
            self.http.clone(),
            base_url,
            api_key,
            timeout,
        ))
    }
}
