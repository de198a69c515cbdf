use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    external::{ExternalClient, RemoteError},
    reconcilers::acl::{acl_name, block_set, parse_acl_name},
    resources::{AclBlock, AclObservation, AclParameters, ApiCredentials},
};

use super::{CloudClient, DataList};

/// Kafka ACL bindings through the Kafka REST v3 API of one cluster endpoint
pub struct AclClient {
    rest: Option<CloudClient>,
    identifier: String,
}

/// One binding as spoken by Kafka REST
#[derive(Deserialize, Serialize, Debug, PartialEq)]
struct KafkaAcl {
    resource_type: String,
    resource_name: String,
    pattern_type: String,
    principal: String,
    host: String,
    operation: String,
    permission: String,
}

impl KafkaAcl {
    fn new(principal: &str, block: &AclBlock) -> Self {
        Self {
            resource_type: block.resource_type.clone(),
            resource_name: block.resource_name.clone(),
            pattern_type: block.pattern_type.clone(),
            principal: principal.to_owned(),
            host: block.host.clone(),
            operation: block.operation.clone(),
            permission: block.permission.clone(),
        }
    }

    fn into_block(self) -> AclBlock {
        AclBlock {
            resource_type: self.resource_type,
            resource_name: self.resource_name,
            pattern_type: self.pattern_type,
            operation: self.operation,
            permission: self.permission,
            host: self.host,
        }
        .normalized()
    }

    /// Query parameters matching exactly this binding
    fn filter(&self) -> [(&'static str, &str); 7] {
        [
            ("resource_type", self.resource_type.as_str()),
            ("resource_name", self.resource_name.as_str()),
            ("pattern_type", self.pattern_type.as_str()),
            ("principal", self.principal.as_str()),
            ("host", self.host.as_str()),
            ("operation", self.operation.as_str()),
            ("permission", self.permission.as_str()),
        ]
    }
}

fn acls_path(cluster: &str) -> String {
    format!("/kafka/v3/clusters/{cluster}/acls")
}

fn split_name(name: &str) -> Result<(&str, &str), RemoteError> {
    parse_acl_name(name).ok_or_else(|| RemoteError::InvalidName(name.to_owned()))
}

/// An adopted set stays bound to the cluster and principal it was adopted under.
///
/// An empty set cannot be observed afterwards, so it is refused as well.
fn ensure_same_target(name: &str, spec: &AclParameters) -> Result<(), RemoteError> {
    if acl_name(&spec.cluster, &spec.principal) != name {
        return Err(RemoteError::Rejected(format!(
            "ACL set `{name}` cannot be moved to `{}`",
            acl_name(&spec.cluster, &spec.principal)
        )));
    }
    if spec.acl_block_list.is_empty() {
        return Err(RemoteError::Rejected(format!(
            "ACL set `{name}` needs at least one binding"
        )));
    }

    Ok(())
}

impl AclClient {
    pub fn new(http: reqwest::Client, credentials: ApiCredentials) -> Self {
        let rest = (!credentials.is_empty() && !credentials.endpoint.is_empty()).then(|| {
            CloudClient::new(
                http,
                &credentials.endpoint,
                &credentials.key,
                &credentials.secret,
            )
        });

        Self {
            rest,
            identifier: credentials.identifier,
        }
    }

    fn rest(&self) -> Result<&CloudClient, RemoteError> {
        self.rest
            .as_ref()
            .ok_or_else(|| RemoteError::Unconfigured(self.identifier.clone()))
    }

    async fn list(&self, cluster: &str, principal: &str) -> Result<BTreeSet<AclBlock>, RemoteError> {
        let rest = self.rest()?;
        let acls: DataList<KafkaAcl> = rest
            .send(
                rest.request(Method::GET, &acls_path(cluster))
                    .query(&[("principal", principal)]),
            )
            .await?;

        Ok(acls.data.into_iter().map(KafkaAcl::into_block).collect())
    }

    async fn bind(&self, cluster: &str, principal: &str, block: &AclBlock) -> Result<(), RemoteError> {
        let rest = self.rest()?;
        debug!(cluster, principal, ?block, "Creating ACL binding");

        rest.execute(
            rest.request(Method::POST, &acls_path(cluster))
                .json(&KafkaAcl::new(principal, block)),
        )
        .await
    }

    async fn unbind(&self, cluster: &str, principal: &str, block: &AclBlock) -> Result<(), RemoteError> {
        let rest = self.rest()?;
        debug!(cluster, principal, ?block, "Deleting ACL binding");

        let acl = KafkaAcl::new(principal, block);
        rest.execute(
            rest.request(Method::DELETE, &acls_path(cluster))
                .query(&acl.filter()),
        )
        .await
    }
}

#[async_trait]
impl ExternalClient for AclClient {
    type Spec = AclParameters;
    type Snapshot = AclObservation;

    async fn lookup_by_name(&self, name: &str) -> Result<Self::Snapshot, RemoteError> {
        let (cluster, principal) = split_name(name)?;
        let blocks = self.list(cluster, principal).await?;

        if blocks.is_empty() {
            return Err(RemoteError::NotFound);
        }

        Ok(AclObservation {
            id: name.to_owned(),
            cluster: cluster.to_owned(),
            principal: principal.to_owned(),
            acl_block_observation_list: blocks.into_iter().collect(),
        })
    }

    async fn create(&self, name: &str, spec: &Self::Spec) -> Result<Self::Snapshot, RemoteError> {
        ensure_same_target(name, spec)?;

        let blocks = block_set(&spec.acl_block_list);
        for block in &blocks {
            self.bind(&spec.cluster, &spec.principal, block).await?;
        }

        Ok(AclObservation {
            id: name.to_owned(),
            cluster: spec.cluster.clone(),
            principal: spec.principal.clone(),
            acl_block_observation_list: blocks.into_iter().collect(),
        })
    }

    async fn update(&self, remote_id: &str, spec: &Self::Spec) -> Result<(), RemoteError> {
        ensure_same_target(remote_id, spec)?;

        let current = self.list(&spec.cluster, &spec.principal).await?;
        let desired = block_set(&spec.acl_block_list);

        for stale in current.difference(&desired) {
            self.unbind(&spec.cluster, &spec.principal, stale).await?;
        }
        for missing in desired.difference(&current) {
            self.bind(&spec.cluster, &spec.principal, missing).await?;
        }

        Ok(())
    }

    async fn delete(&self, remote_id: &str) -> Result<(), RemoteError> {
        let (cluster, principal) = split_name(remote_id)?;
        let rest = self.rest()?;
        debug!(cluster, principal, "Deleting all ACL bindings");

        rest.execute(rest.request(Method::DELETE, &acls_path(cluster)).query(&[
            ("principal", principal),
            ("resource_type", "ANY"),
            ("pattern_type", "ANY"),
            ("operation", "ANY"),
            ("permission", "ANY"),
        ]))
        .await
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::{json, Value};

    use super::*;
    use crate::confluent::test_server::{Received, TestServer};

    fn block(resource_name: &str, operation: &str) -> AclBlock {
        AclBlock {
            resource_type: "TOPIC".into(),
            resource_name: resource_name.into(),
            pattern_type: "LITERAL".into(),
            operation: operation.into(),
            permission: "ALLOW".into(),
            host: "*".into(),
        }
    }

    fn binding(resource_name: &str, operation: &str) -> Value {
        serde_json::to_value(KafkaAcl::new("User:sa-1", &block(resource_name, operation))).unwrap()
    }

    fn client(server: &TestServer) -> AclClient {
        AclClient::new(
            reqwest::Client::new(),
            ApiCredentials {
                identifier: "acls.confluent.managed.io".into(),
                key: "acl-key".into(),
                secret: "acl-secret".into(),
                endpoint: server.url.clone(),
            },
        )
    }

    /// Answers listings with `existing` and accepts every write
    async fn cluster_with(existing: Vec<Value>) -> TestServer {
        TestServer::start(move |request: &Received| match request.method.as_str() {
            "GET" => (200, json!({ "data": existing })),
            "POST" => (201, Value::Null),
            _ => (200, json!({ "data": [] })),
        })
        .await
    }

    fn parameters() -> AclParameters {
        AclParameters {
            cluster: "lkc-123".into(),
            principal: "User:sa-1".into(),
            acl_block_list: vec![AclBlock {
                resource_type: "TOPIC".into(),
                resource_name: "orders".into(),
                pattern_type: "LITERAL".into(),
                operation: "READ".into(),
                permission: "ALLOW".into(),
                host: "*".into(),
            }],
        }
    }

    #[test]
    fn kafka_rest_listing_decodes_into_normalized_blocks() {
        let body = indoc! {r#"
            {
              "kind": "KafkaAclDataList",
              "metadata": { "self": "https://pkc-1.confluent.cloud/kafka/v3/clusters/lkc-123/acls" },
              "data": [
                {
                  "kind": "KafkaAcl",
                  "cluster_id": "lkc-123",
                  "resource_type": "TOPIC",
                  "resource_name": "orders",
                  "pattern_type": "LITERAL",
                  "principal": "User:sa-1",
                  "host": "*",
                  "operation": "READ",
                  "permission": "ALLOW"
                }
              ]
            }
        "#};

        let list: DataList<KafkaAcl> = serde_json::from_str(body).unwrap();
        let blocks: Vec<AclBlock> = list.data.into_iter().map(KafkaAcl::into_block).collect();

        assert_eq!(
            blocks,
            vec![AclBlock {
                resource_type: "TOPIC".into(),
                resource_name: "orders".into(),
                pattern_type: "LITERAL".into(),
                operation: "READ".into(),
                permission: "ALLOW".into(),
                host: "*".into(),
            }]
        );
    }

    #[test]
    fn binding_filter_names_every_field() {
        let acl = KafkaAcl::new(
            "User:sa-1",
            &AclBlock {
                resource_type: "GROUP".into(),
                resource_name: "consumers".into(),
                pattern_type: "PREFIXED".into(),
                operation: "READ".into(),
                permission: "ALLOW".into(),
                host: "*".into(),
            },
        );

        let filter = acl.filter();
        assert!(filter.contains(&("principal", "User:sa-1")));
        assert!(filter.contains(&("pattern_type", "PREFIXED")));
        assert_eq!(filter.len(), 7);
    }

    #[test]
    fn adopted_sets_cannot_change_target() {
        assert!(ensure_same_target("lkc-123/User:sa-1", &parameters()).is_ok());

        let err = ensure_same_target("lkc-123/User:sa-2", &parameters()).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
    }

    #[test]
    fn empty_sets_are_refused() {
        let mut spec = parameters();
        spec.acl_block_list.clear();

        let err = ensure_same_target("lkc-123/User:sa-1", &spec).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
    }

    #[tokio::test]
    async fn malformed_names_are_rejected_before_any_request() {
        let client = AclClient::new(
            reqwest::Client::new(),
            ApiCredentials {
                identifier: "acls.confluent.managed.io".into(),
                key: "key".into(),
                secret: "secret".into(),
                endpoint: "https://pkc-1.confluent.cloud".into(),
            },
        );

        let err = client.lookup_by_name("no-separator").await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidName(_)));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_on_first_use() {
        let client = AclClient::new(
            reqwest::Client::new(),
            ApiCredentials {
                identifier: "acls.confluent.managed.io".into(),
                key: "key".into(),
                secret: "secret".into(),
                endpoint: String::new(),
            },
        );

        let err = client.delete("lkc-123/User:sa-1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unconfigured(_)));
    }

    #[tokio::test]
    async fn lookup_observes_the_principals_bindings() {
        let server = cluster_with(vec![binding("orders", "read")]).await;

        let observed = client(&server).lookup_by_name("lkc-123/User:sa-1").await.unwrap();

        assert_eq!(observed.id, "lkc-123/User:sa-1");
        assert_eq!(observed.acl_block_observation_list, vec![block("orders", "READ")]);
        let request = &server.received()[0];
        assert_eq!(request.path, "/kafka/v3/clusters/lkc-123/acls");
        assert_eq!(request.param("principal").as_deref(), Some("User:sa-1"));
    }

    #[tokio::test]
    async fn lookup_without_bindings_is_not_found() {
        let server = cluster_with(vec![]).await;

        let err = client(&server).lookup_by_name("lkc-123/User:sa-1").await.unwrap_err();

        assert!(matches!(err, RemoteError::NotFound));
    }

    #[tokio::test]
    async fn create_posts_one_binding_per_block() {
        let server = cluster_with(vec![]).await;
        let mut spec = parameters();
        spec.acl_block_list.push(block("payments", "WRITE"));
        // declared twice, bound once
        spec.acl_block_list.push(block("orders", "read"));

        let created = client(&server).create("lkc-123/User:sa-1", &spec).await.unwrap();

        assert_eq!(created.acl_block_observation_list.len(), 2);
        let writes = server.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes
            .iter()
            .all(|w| w.method == "POST" && w.path == "/kafka/v3/clusters/lkc-123/acls"));
        let bodies: Vec<_> = writes.into_iter().filter_map(|w| w.body).collect();
        assert!(bodies.contains(&binding("orders", "READ")));
        assert!(bodies.contains(&binding("payments", "WRITE")));
    }

    #[tokio::test]
    async fn update_unbinds_undeclared_and_binds_missing() {
        let server = cluster_with(vec![binding("orders", "READ"), binding("orders", "WRITE")]).await;
        let mut spec = parameters();
        spec.acl_block_list.push(block("payments", "READ"));

        client(&server).update("lkc-123/User:sa-1", &spec).await.unwrap();

        let writes = server.writes();
        assert_eq!(writes.len(), 2);

        let unbound = &writes[0];
        assert_eq!(unbound.method, "DELETE");
        assert_eq!(unbound.param("resource_name").as_deref(), Some("orders"));
        assert_eq!(unbound.param("operation").as_deref(), Some("WRITE"));
        assert_eq!(unbound.param("principal").as_deref(), Some("User:sa-1"));
        assert_eq!(unbound.params().len(), 7);

        let bound = &writes[1];
        assert_eq!(bound.method, "POST");
        assert_eq!(bound.body, Some(binding("payments", "READ")));
    }

    #[tokio::test]
    async fn matching_bindings_need_no_writes() {
        let server = cluster_with(vec![binding("orders", "READ")]).await;

        client(&server).update("lkc-123/User:sa-1", &parameters()).await.unwrap();

        assert!(server.writes().is_empty());
    }

    #[tokio::test]
    async fn delete_matches_every_binding_of_the_principal() {
        let server = cluster_with(vec![]).await;

        client(&server).delete("lkc-123/User:sa-1").await.unwrap();

        let writes = server.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, "DELETE");
        assert_eq!(writes[0].path, "/kafka/v3/clusters/lkc-123/acls");
        let params = writes[0].params();
        for (key, value) in [
            ("principal", "User:sa-1"),
            ("resource_type", "ANY"),
            ("pattern_type", "ANY"),
            ("operation", "ANY"),
            ("permission", "ANY"),
        ] {
            assert!(
                params.contains(&(key.to_owned(), value.to_owned())),
                "{key}={value} missing from {params:?}"
            );
        }
    }
}
