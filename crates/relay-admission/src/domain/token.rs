//! Capability tokens and their restriction fields.

use crate::domain::principal::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Token identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub i64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend channel identifier (selectable by admins via the key suffix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of model names a token may request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelAllowlist(BTreeSet<String>);

impl ModelAllowlist {
    /// Parse the stored comma-separated form.
    ///
    /// Returns `None` when no model survives trimming, which means the
    /// token is unrestricted.
    pub fn parse(list: &str) -> Option<Self> {
        let models: BTreeSet<String> = list
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        if models.is_empty() {
            None
        } else {
            Some(Self(models))
        }
    }

    pub fn contains(&self, model: &str) -> bool {
        self.0.contains(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ModelAllowlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ModelAllowlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

/// A bearer credential record as returned by the token store.
///
/// `device_fingerprint` only ever moves from `None` to `Some` through the
/// store's compare-and-set; nothing in this crate resets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken {
    pub id: TokenId,
    pub key: String,
    pub owner: UserId,
    pub name: String,
    /// Comma-separated CIDR list; `None` means any client address
    pub subnet_restriction: Option<String>,
    /// `None` means every model is allowed
    pub allowed_models: Option<ModelAllowlist>,
    pub device_fingerprint: Option<String>,
}

impl CapabilityToken {
    pub fn new(id: TokenId, key: impl Into<String>, owner: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            owner,
            name: name.into(),
            subnet_restriction: None,
            allowed_models: None,
            device_fingerprint: None,
        }
    }

    /// Restrict to a subnet list; an empty string clears the restriction.
    pub fn with_subnet(mut self, subnet: impl Into<String>) -> Self {
        let subnet = subnet.into();
        self.subnet_restriction = if subnet.trim().is_empty() {
            None
        } else {
            Some(subnet)
        };
        self
    }

    /// Restrict to a comma-separated model list; an empty list clears it.
    pub fn with_models(mut self, models: &str) -> Self {
        self.allowed_models = ModelAllowlist::parse(models);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.device_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn is_bound(&self) -> bool {
        self.device_fingerprint.is_some()
    }
}
