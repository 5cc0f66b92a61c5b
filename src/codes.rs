use sha2::{Digest, Sha256};

use crate::domain::DatasetIdentity;

/// Produces the deterministic code half of a dataset key.
pub trait CodeGenerator {
    fn code(&self, identity: &DatasetIdentity) -> String;
}

/// SHA-256 over the lowercased identity fields, truncated to 32 hex chars.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityHasher;

impl CodeGenerator for ActivityHasher {
    fn code(&self, identity: &DatasetIdentity) -> String {
        let categories = identity.categories.join(",");
        let mut hasher = Sha256::new();
        for part in [
            identity.name.as_str(),
            categories.as_str(),
            identity.unit.as_str(),
            identity.location.as_str(),
        ] {
            hasher.update(part.to_lowercase().as_bytes());
            hasher.update([0x1f]);
        }
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(32);
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, location: &str) -> DatasetIdentity {
        DatasetIdentity {
            name: name.to_string(),
            unit: "kilogram".to_string(),
            location: location.to_string(),
            categories: vec!["Materials".to_string(), "Metals".to_string()],
        }
    }

    #[test]
    fn stable_and_case_insensitive() {
        let a = ActivityHasher.code(&identity("Steel", "CH"));
        let b = ActivityHasher.code(&identity("STEEL", "ch"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn location_changes_code() {
        let a = ActivityHasher.code(&identity("Steel", "CH"));
        let b = ActivityHasher.code(&identity("Steel", "DE"));
        assert_ne!(a, b);
    }
}
