//! Target registry
//!
//! Holds the set of monitoring servers to probe, keyed by a unique,
//! human-readable instance name.

use std::collections::BTreeMap;
use std::fmt;

/// Static HTTP Basic Authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection descriptor for one monitoring server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// Unique instance name
    pub name: String,
    /// Base URL of the server's HTTP API
    pub address: String,
    /// Optional Basic Authentication credentials
    pub credentials: Option<Credentials>,
}

impl TargetDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Ordered-irrelevant mapping from instance name to descriptor
///
/// Names are unique by construction. Iteration follows name order so that
/// task spawning is deterministic, although nothing downstream relies on it.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, TargetDescriptor>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a target, replacing any previous target with the same name
    ///
    /// # Returns
    ///
    /// The replaced descriptor, if there was one
    pub fn insert(&mut self, target: TargetDescriptor) -> Option<TargetDescriptor> {
        self.targets.insert(target.name.clone(), target)
    }

    pub fn get(&self, name: &str) -> Option<&TargetDescriptor> {
        self.targets.get(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.targets.values()
    }
}

impl FromIterator<TargetDescriptor> for TargetRegistry {
    fn from_iter<I: IntoIterator<Item = TargetDescriptor>>(iter: I) -> Self {
        let mut registry = TargetRegistry::new();
        for target in iter {
            registry.insert(target);
        }
        registry
    }
}
