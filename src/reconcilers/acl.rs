use std::collections::BTreeSet;

use kube::ResourceExt;

use crate::{
    external::RemoteSnapshot,
    resources::{Acl, AclBlock, AclObservation, AclParameters, ManagedStatus, ProviderConfigReference},
    Error, Result,
};

use super::Managed;

/// The name an ACL set is addressed by: `<cluster>/<principal>`
pub fn acl_name(cluster: &str, principal: &str) -> String {
    format!("{cluster}/{principal}")
}

/// Split an ACL set name back into cluster and principal
pub fn parse_acl_name(name: &str) -> Option<(&str, &str)> {
    name.split_once('/')
        .filter(|(cluster, principal)| !cluster.is_empty() && !principal.is_empty())
}

/// Bindings compared as a set, since the cluster returns them in no particular order
pub fn block_set(blocks: &[AclBlock]) -> BTreeSet<AclBlock> {
    blocks.iter().map(AclBlock::normalized).collect()
}

impl Managed for Acl {
    type Parameters = AclParameters;
    type Snapshot = AclObservation;

    const API_IDENTIFIER: &'static str = "acls.confluent.managed.io";

    fn parameters(&self) -> &Self::Parameters {
        &self.spec.for_provider
    }

    fn provider_config_ref(&self) -> &ProviderConfigReference {
        &self.spec.provider_config_ref
    }

    fn managed_status(&self) -> Option<&ManagedStatus<Self::Snapshot>> {
        self.status.as_ref()
    }

    fn candidate_name(&self) -> Result<String> {
        let AclParameters {
            cluster, principal, ..
        } = &self.spec.for_provider;

        if cluster.is_empty() || cluster.contains('/') {
            return Err(Error::IllegalResource(
                self.name_any(),
                "cluster must be a non-empty cluster id".into(),
            ));
        }
        if principal.is_empty() {
            return Err(Error::IllegalResource(
                self.name_any(),
                "principal must not be empty".into(),
            ));
        }

        Ok(acl_name(cluster, principal))
    }

    fn is_up_to_date(&self, observed: &Self::Snapshot) -> bool {
        let desired = &self.spec.for_provider;

        desired.cluster == observed.cluster
            && desired.principal == observed.principal
            && block_set(&desired.acl_block_list) == block_set(&observed.acl_block_observation_list)
    }
}

impl RemoteSnapshot for AclObservation {
    fn remote_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use crate::resources::AclSpec;

    use super::*;

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

    fn acl(blocks: Vec<AclBlock>) -> Acl {
        Acl::new(
            "payments-acl",
            AclSpec {
                provider_config_ref: ProviderConfigReference::default(),
                for_provider: AclParameters {
                    cluster: "lkc-123".into(),
                    principal: "User:sa-1".into(),
                    acl_block_list: blocks,
                },
            },
        )
    }

    fn observed(blocks: Vec<AclBlock>) -> AclObservation {
        AclObservation {
            id: "lkc-123/User:sa-1".into(),
            cluster: "lkc-123".into(),
            principal: "User:sa-1".into(),
            acl_block_observation_list: blocks,
        }
    }

    #[test]
    fn block_order_does_not_matter() {
        let desired = acl(vec![block("orders", "READ"), block("orders", "WRITE")]);
        let remote = observed(vec![block("orders", "WRITE"), block("orders", "READ")]);

        assert!(desired.is_up_to_date(&remote));
    }

    #[test]
    fn enum_fields_compare_case_insensitively() {
        let mut lower = block("orders", "read");
        lower.resource_type = "topic".into();
        lower.pattern_type = "literal".into();
        lower.permission = "allow".into();
        lower.host = String::new();

        assert!(acl(vec![lower]).is_up_to_date(&observed(vec![block("orders", "READ")])));
    }

    #[test]
    fn resource_names_are_case_sensitive() {
        let desired = acl(vec![block("Orders", "READ")]);
        assert!(!desired.is_up_to_date(&observed(vec![block("orders", "READ")])));
    }

    #[test]
    fn missing_or_extra_blocks_drift() {
        let desired = acl(vec![block("orders", "READ"), block("orders", "WRITE")]);

        assert!(!desired.is_up_to_date(&observed(vec![block("orders", "READ")])));
        assert!(!desired.is_up_to_date(&observed(vec![
            block("orders", "READ"),
            block("orders", "WRITE"),
            block("payments", "READ"),
        ])));
    }

    #[test]
    fn principal_is_compared() {
        let desired = acl(vec![block("orders", "READ")]);
        let mut remote = observed(vec![block("orders", "READ")]);
        remote.principal = "User:sa-2".into();

        assert!(!desired.is_up_to_date(&remote));
    }

    #[test]
    fn candidate_name_combines_cluster_and_principal() {
        let name = acl(vec![]).candidate_name().unwrap();

        assert_eq!(name, "lkc-123/User:sa-1");
        assert_eq!(parse_acl_name(&name), Some(("lkc-123", "User:sa-1")));
    }

    #[test]
    fn candidate_name_requires_cluster_and_principal() {
        let mut resource = acl(vec![]);
        resource.spec.for_provider.principal.clear();
        assert!(matches!(
            resource.candidate_name(),
            Err(Error::IllegalResource(..))
        ));

        let mut resource = acl(vec![]);
        resource.spec.for_provider.cluster = "lkc/123".into();
        assert!(resource.candidate_name().is_err());
    }

    #[test]
    fn malformed_names_do_not_parse() {
        assert_eq!(parse_acl_name("lkc-123"), None);
        assert_eq!(parse_acl_name("/User:sa-1"), None);
        assert_eq!(parse_acl_name("lkc-123/"), None);
    }
}
