use crate::{
    external::RemoteSnapshot,
    resources::{
        ManagedStatus, ProviderConfigReference, ServiceAccount, ServiceAccountObservation,
        ServiceAccountParameters,
    },
};

use super::Managed;

impl Managed for ServiceAccount {
    type Parameters = ServiceAccountParameters;
    type Snapshot = ServiceAccountObservation;

    const API_IDENTIFIER: &'static str = "serviceaccounts.confluent.managed.io";

    fn parameters(&self) -> &Self::Parameters {
        &self.spec.for_provider
    }

    fn provider_config_ref(&self) -> &ProviderConfigReference {
        &self.spec.provider_config_ref
    }

    fn managed_status(&self) -> Option<&ManagedStatus<Self::Snapshot>> {
        self.status.as_ref()
    }

    // The display name is how the account is addressed, so only the description can drift
    fn is_up_to_date(&self, observed: &Self::Snapshot) -> bool {
        self.spec.for_provider.description == observed.description
    }
}

impl RemoteSnapshot for ServiceAccountObservation {
    fn remote_id(&self) -> &str {
        &self.id
    }
}
