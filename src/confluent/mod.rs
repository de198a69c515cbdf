//! A thin client for the Confluent Cloud REST APIs.
//!
//! Every request carries HTTP basic auth and is bounded by the timeout of the
//! shared `reqwest::Client`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    config::Config,
    connector::{ClientFactory, CloudCredentials, ConnectionError},
    external::RemoteError,
    resources::{Acl, ApiCredentials, ServiceAccount},
    Result,
};

mod acl;
mod service_account;
#[cfg(test)]
pub(crate) mod test_server;

pub use acl::AclClient;
pub use service_account::ServiceAccountClient;

/// An HTTP session against one Confluent API base URL
#[derive(Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    secret: String,
}

/// The `data` envelope wrapped around Confluent list responses
#[derive(Deserialize)]
pub(crate) struct DataList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub metadata: ListMetadata,
}

#[derive(Default, Deserialize)]
pub(crate) struct ListMetadata {
    /// URL of the next page, absent or null on the last one
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> DataList<T> {
    /// The `page_token` carried by `metadata.next`, if there is a further page.
    ///
    /// `next` may be absolute or relative to the list URL.
    pub fn next_page_token(&self) -> Option<String> {
        let next = self.metadata.next.as_deref().filter(|n| !n.is_empty())?;
        let base = reqwest::Url::parse("http://localhost/list").ok()?;
        base.join(next)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == "page_token")
            .map(|(_, token)| token.into_owned())
            .filter(|token| !token.is_empty())
    }
}

impl CloudClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        self.http
            .request(method, url)
            .basic_auth(&self.key, Some(&self.secret))
    }

    /// Send a request and decode its JSON body
    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Send a request, ignoring any body
    pub async fn execute(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        check(request.send().await?).await?;
        Ok(())
    }

    /// Verify the credentials with a cheap read of the account's environments
    pub async fn authenticate(&self) -> Result<(), RemoteError> {
        self.execute(
            self.request(Method::GET, "/org/v2/environments")
                .query(&[("page_size", "1")]),
        )
        .await
    }
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull a readable message out of an error body.
///
/// Cloud APIs answer `{"errors": [{"detail": ..}]}`, Kafka REST answers `{"message": ..}`.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/errors/0/detail")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

/// Builds authenticated clients for every supported resource kind
#[derive(Clone)]
pub struct ConfluentFactory {
    http: reqwest::Client,
    api_url: String,
}

impl ConfluentFactory {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("confluent-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }

    async fn authenticate(&self, credentials: &CloudCredentials) -> Result<(), ConnectionError> {
        CloudClient::new(
            self.http.clone(),
            &self.api_url,
            &credentials.key,
            &credentials.secret,
        )
        .authenticate()
        .await
        .map_err(ConnectionError::AuthenticationFailed)
    }
}

#[async_trait]
impl ClientFactory<ServiceAccount> for ConfluentFactory {
    type Client = ServiceAccountClient;

    async fn new_client(
        &self,
        credentials: CloudCredentials,
        api_credentials: ApiCredentials,
    ) -> Result<Self::Client, ConnectionError> {
        self.authenticate(&credentials).await?;
        Ok(ServiceAccountClient::new(
            self.http.clone(),
            &self.api_url,
            api_credentials,
        ))
    }
}

#[async_trait]
impl ClientFactory<Acl> for ConfluentFactory {
    type Client = AclClient;

    async fn new_client(
        &self,
        credentials: CloudCredentials,
        api_credentials: ApiCredentials,
    ) -> Result<Self::Client, ConnectionError> {
        self.authenticate(&credentials).await?;
        Ok(AclClient::new(self.http.clone(), api_credentials))
    }
}
