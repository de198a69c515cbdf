use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    external::{ExternalClient, RemoteError},
    resources::{ApiCredentials, ServiceAccountObservation, ServiceAccountParameters},
};

use super::{CloudClient, DataList};

const SERVICE_ACCOUNTS: &str = "/iam/v2/service-accounts";
const PAGE_SIZE: &str = "100";

/// Service accounts through the Confluent Cloud IAM v2 API
pub struct ServiceAccountClient {
    cloud: Option<CloudClient>,
    identifier: String,
}

/// A service account as returned by IAM
#[derive(Deserialize)]
struct IamServiceAccount {
    id: String,
    display_name: String,
    #[serde(default)]
    description: String,
}

impl From<IamServiceAccount> for ServiceAccountObservation {
    fn from(account: IamServiceAccount) -> Self {
        Self {
            id: account.id,
            display_name: account.display_name,
            description: account.description,
        }
    }
}

impl ServiceAccountClient {
    /// `api_url` is used unless the credentials name their own endpoint.
    pub fn new(http: reqwest::Client, api_url: &str, credentials: ApiCredentials) -> Self {
        let cloud = (!credentials.is_empty()).then(|| {
            let base_url = if credentials.endpoint.is_empty() {
                api_url
            } else {
                credentials.endpoint.as_str()
            };
            CloudClient::new(http, base_url, &credentials.key, &credentials.secret)
        });

        Self {
            cloud,
            identifier: credentials.identifier,
        }
    }

    fn cloud(&self) -> Result<&CloudClient, RemoteError> {
        self.cloud
            .as_ref()
            .ok_or_else(|| RemoteError::Unconfigured(self.identifier.clone()))
    }
}

#[async_trait]
impl ExternalClient for ServiceAccountClient {
    type Spec = ServiceAccountParameters;
    type Snapshot = ServiceAccountObservation;

    async fn lookup_by_name(&self, name: &str) -> Result<Self::Snapshot, RemoteError> {
        let cloud = self.cloud()?;
        let mut page_token: Option<String> = None;

        // IAM has no display name filter, so walk every page
        loop {
            let mut request = cloud
                .request(Method::GET, SERVICE_ACCOUNTS)
                .query(&[("page_size", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("page_token", token)]);
            }

            let page: DataList<IamServiceAccount> = cloud.send(request).await?;
            page_token = page.next_page_token();

            if let Some(account) = page.data.into_iter().find(|a| a.display_name == name) {
                return Ok(account.into());
            }
            if page_token.is_none() {
                return Err(RemoteError::NotFound);
            }
        }
    }

    async fn create(&self, name: &str, spec: &Self::Spec) -> Result<Self::Snapshot, RemoteError> {
        let cloud = self.cloud()?;
        debug!(name, "Creating service account");

        let created: IamServiceAccount = cloud
            .send(cloud.request(Method::POST, SERVICE_ACCOUNTS).json(&json!({
                "display_name": name,
                "description": spec.description,
            })))
            .await?;

        Ok(created.into())
    }

    async fn update(&self, remote_id: &str, spec: &Self::Spec) -> Result<(), RemoteError> {
        let cloud = self.cloud()?;
        debug!(remote_id, "Updating service account");

        cloud
            .execute(
                cloud
                    .request(Method::PATCH, &format!("{SERVICE_ACCOUNTS}/{remote_id}"))
                    .json(&json!({ "description": spec.description })),
            )
            .await
    }

    async fn delete(&self, remote_id: &str) -> Result<(), RemoteError> {
        let cloud = self.cloud()?;
        debug!(remote_id, "Deleting service account");

        cloud
            .execute(cloud.request(Method::DELETE, &format!("{SERVICE_ACCOUNTS}/{remote_id}")))
            .await
    }
}
