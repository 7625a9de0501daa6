//! Bearer credential micro-format: `[Bearer ][sk-]<key>[-<channel>[-...]]`.
//!
//! The key is the text before the first `-`. Only the second segment is
//! read (as a channel selector); anything after it is ignored.
//!
//! Parsing runs before the key is looked up, so a malformed selector is a
//! 400 even when the key itself is unknown and would otherwise be a 401.

use crate::domain::error::GateError;
use crate::domain::token::ChannelId;

const BEARER_PREFIX: &str = "Bearer ";
const KEY_PREFIX: &str = "sk-";

/// Parsed `Authorization` value for relay routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredential {
    pub key: String,
    pub channel_selector: Option<ChannelId>,
}

/// Malformed credential
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("missing api key")]
    MissingKey,

    #[error("invalid channel selector: {0:?}")]
    InvalidChannelSelector(String),
}

impl From<CredentialError> for GateError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::MissingKey => GateError::Unauthenticated(e.to_string()),
            CredentialError::InvalidChannelSelector(_) => GateError::BadRequest(e.to_string()),
        }
    }
}

impl BearerCredential {
    pub fn parse(header: &str) -> Result<Self, CredentialError> {
        let raw = header.strip_prefix(BEARER_PREFIX).unwrap_or(header);
        let raw = raw.strip_prefix(KEY_PREFIX).unwrap_or(raw);

        let mut segments = raw.split('-');
        let key = segments.next().unwrap_or_default();
        if key.is_empty() {
            return Err(CredentialError::MissingKey);
        }

        let channel_selector = match segments.next() {
            None => None,
            Some(selector) => Some(parse_channel(selector)?),
        };

        Ok(Self {
            key: key.to_string(),
            channel_selector,
        })
    }
}

fn parse_channel(selector: &str) -> Result<ChannelId, CredentialError> {
    // u32::from_str accepts a leading '+', the selector format does not
    if selector.is_empty() || !selector.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CredentialError::InvalidChannelSelector(selector.to_string()));
    }
    selector
        .parse::<u32>()
        .map(ChannelId)
        .map_err(|_| CredentialError::InvalidChannelSelector(selector.to_string()))
}
