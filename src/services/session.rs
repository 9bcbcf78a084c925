use crate::{backend::SessionProvider, errors::ClientError, models::identity::Identity};

/// Snapshot of who is acting, passed into every operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    identity: Option<Identity>,
}

impl SessionContext {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_provider(provider: &dyn SessionProvider) -> Self {
        Self {
            identity: provider.current_identity(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// The acting identity, or `Unauthenticated`.
    pub fn require(&self) -> Result<&Identity, ClientError> {
        self.identity.as_ref().ok_or(ClientError::Unauthenticated)
    }
}
