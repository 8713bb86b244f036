//! HTTP client for the support backend
//!
//! Wraps one reqwest client with the bearer header and the error body rules
//! shared by every request/response call.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use supportchat_shared::{server_message, Id};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

pub const SIGNUP_PATH: &str = "/api/v1/auth/signup";
pub const TICKETS_PATH: &str = "/api/v1/tickets";

pub fn ticket_path(ticket_id: &Id) -> String {
    format!("{}/{}", TICKETS_PATH, ticket_id)
}

pub fn messages_path(ticket_id: &Id) -> String {
    format!("{}/{}/messages", TICKETS_PATH, ticket_id)
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    bearer_prefix: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
            bearer_prefix: config.bearer_prefix.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("{}{}", self.bearer_prefix, token)),
            None => request,
        }
    }

    /// GET `path`, decoding a JSON body on success
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        fallback: &str,
    ) -> ClientResult<T> {
        let request = self.authorize(self.http.get(self.url(path)), token);
        tracing::debug!(path = %path, "GET");
        execute(request, fallback).await
    }

    /// POST a JSON body to `path`, decoding a JSON body on success
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
        fallback: &str,
    ) -> ClientResult<T> {
        let request = self.authorize(self.http.post(self.url(path)), token).json(body);
        tracing::debug!(path = %path, "POST");
        execute(request, fallback).await
    }
}

/// Send the request and map non-2xx responses to `ClientError::Server`.
///
/// The server message is taken from the JSON error body when present,
/// otherwise `fallback` is used.
async fn execute<T: DeserializeOwned>(request: RequestBuilder, fallback: &str) -> ClientResult<T> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| fallback.to_string());

        tracing::warn!(status = status.as_u16(), message = %message, "Request rejected by server");
        return Err(ClientError::Server {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}
