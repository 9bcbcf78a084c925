use serde::{Deserialize, Serialize};

use super::file::user_namespace;

/// An authenticated account as reported by the session provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    /// Bearer token forwarded to remote jobs, if the provider issues one.
    pub token: Option<String>,
}

impl Identity {
    /// Storage prefix owned by this identity (`userFiles/{uid}/`).
    pub fn namespace(&self) -> String {
        user_namespace(&self.uid)
    }

    /// Whether `full_path` falls under this identity's namespace.
    pub fn owns_path(&self, full_path: &str) -> bool {
        full_path.starts_with(&self.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            uid: "alice".into(),
            email: "alice@example.com".into(),
            token: None,
        }
    }

    #[test]
    fn owns_only_paths_under_own_namespace() {
        let id = alice();
        assert!(id.owns_path("userFiles/alice/1700000000000-a.txt"));
        assert!(!id.owns_path("userFiles/bob/1700000000000-a.txt"));
        assert!(!id.owns_path("userFiles/alice2/1700000000000-a.txt"));
        assert!(!id.owns_path("userFiles/alice"));
        assert!(!id.owns_path("jobs/abc.zip"));
    }
}
