use std::fmt;

use crate::identity::Identity;

/// Slash separated address of a collection, e.g. `users/u1/people`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CollectionPath(String);

impl CollectionPath {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn doc(&self, id: &str) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct DocumentPath {
    pub(crate) collection: CollectionPath,
    pub(crate) id: String,
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Every collection a signed-in identity can reach hangs off its scope:
/// `[artifacts/{app_id}/]users/{identity}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Scope {
    identity: Identity,
    root: String,
}

impl Scope {
    pub(crate) fn new(app_id: Option<&str>, identity: Identity) -> Self {
        let root = match app_id {
            Some(app) => format!("artifacts/{app}/users/{}", identity.as_str()),
            None => format!("users/{}", identity.as_str()),
        };
        Self { identity, root }
    }

    pub(crate) fn identity(&self) -> &Identity {
        &self.identity
    }

    pub(crate) fn people(&self) -> CollectionPath {
        CollectionPath(format!("{}/people", self.root))
    }

    pub(crate) fn person(&self, person_id: &str) -> DocumentPath {
        self.people().doc(person_id)
    }

    pub(crate) fn transactions(&self, person_id: &str) -> CollectionPath {
        CollectionPath(format!("{}/people/{person_id}/transactions", self.root))
    }
}
