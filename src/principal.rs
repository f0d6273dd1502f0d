//! Verified identity attached to an authenticated request.

use std::collections::BTreeSet;

use crate::store::CredentialRecord;

/// Identity plus authority set.
///
/// Only produced by token verification or from a stored credential record; the
/// identity is the immutable account id, never the mutable username.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    identity: String,
    authorities: BTreeSet<String>,
}

impl Principal {
    pub(crate) fn new<I, S>(identity: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity: identity.into(),
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn from_record(record: &CredentialRecord) -> Self {
        Self::new(record.id.to_string(), record.authorities.iter().cloned())
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorities_are_deduplicated() {
        let principal = Principal::new("42", ["USER", "ADMIN", "USER"]);
        assert_eq!(principal.identity(), "42");
        assert_eq!(principal.authorities().len(), 2);
        assert!(principal.authorities().contains("ADMIN"));
        assert!(!principal.authorities().contains("OPERATOR"));
    }
}
