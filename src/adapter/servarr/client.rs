//! # Servarr REST Client
//!
//! Thin JSON client for the servarr API family. Every request carries the
//! `X-Api-Key` header and the per-connection timeout.

use crate::adapter::{AdapterError, ConnectionDescriptor};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub(crate) struct ServarrClient<'a> {
    http: &'a Client,
    conn: &'a ConnectionDescriptor,
    api_prefix: &'static str,
}

impl std::fmt::Debug for ServarrClient<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServarrClient")
            .field("base_url", &self.conn.base_url)
            .field("api_prefix", &self.api_prefix)
            .finish_non_exhaustive()
    }
}

impl<'a> ServarrClient<'a> {
    pub(crate) fn new(http: &'a Client, conn: &'a ConnectionDescriptor, api_prefix: &'static str) -> Self {
        Self {
            http,
            conn,
            api_prefix,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.conn.base_url.trim_end_matches('/'),
            self.api_prefix,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Api-Key", &self.conn.api_key)
            .timeout(self.conn.timeout)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let url = self.url(path);
        let response = self.send(Method::GET, &url, self.request(Method::GET, &url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AdapterError::InvalidResponse {
                url,
                detail: e.to_string(),
            })
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), AdapterError> {
        let url = self.url(path);
        self.send(Method::POST, &url, self.request(Method::POST, &url).json(body))
            .await
            .map(drop)
    }

    pub(crate) async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), AdapterError> {
        let url = self.url(path);
        self.send(Method::PUT, &url, self.request(Method::PUT, &url).json(body))
            .await
            .map(drop)
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), AdapterError> {
        let url = self.url(path);
        self.send(Method::DELETE, &url, self.request(Method::DELETE, &url))
            .await
            .map(drop)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, AdapterError> {
        debug!(method = %method, url = url, "servarr.request");
        let response = request.send().await.map_err(|source| AdapterError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(url = url, error = %e, "servarr.error_body_unreadable");
                String::new()
            }
        };
        Err(AdapterError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}
