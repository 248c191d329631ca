//! Identity types and the track request model
//!
//! Tenants, channels and users are opaque 64-bit identifiers handed to us by the
//! chat platform. They are wrapped in newtypes so a channel id can never be
//! passed where a tenant id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| Error::InvalidInput(format!("invalid {} '{}': {}", stringify!($name), s, e)))
            }
        }
    };
}

snowflake_id!(
    /// Isolated scope (one community) with its own queue and session
    TenantId
);

snowflake_id!(
    /// Audio channel inside a tenant
    ChannelId
);

snowflake_id!(
    /// Participant who requested a track
    UserId
);

/// Reference to one audio channel of one tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub tenant: TenantId,
    pub channel: ChannelId,
}

impl ChannelRef {
    pub fn new(tenant: TenantId, channel: ChannelId) -> Self {
        Self { tenant, channel }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.channel)
    }
}

/// A pending playback request
///
/// Immutable once enqueued. Built by the command layer or by the source
/// resolver's describe step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    /// Link as submitted by the user
    pub source_link: String,
    /// Display title
    pub title: String,
    /// Display duration (`M:SS`, `H:MM:SS` or `unknown`)
    pub duration_label: String,
    /// Who asked for it
    pub requested_by: UserId,
}

impl TrackRequest {
    pub fn new(
        source_link: impl Into<String>,
        title: impl Into<String>,
        duration_label: impl Into<String>,
        requested_by: UserId,
    ) -> Self {
        Self {
            source_link: source_link.into(),
            title: title.into(),
            duration_label: duration_label.into(),
            requested_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_parse_and_display() {
        let tenant: TenantId = "123456789012345678".parse().unwrap();
        assert_eq!(tenant.get(), 123456789012345678);
        assert_eq!(tenant.to_string(), "123456789012345678");

        assert!(" 42 ".parse::<ChannelId>().is_ok());
        assert!("not-a-number".parse::<UserId>().is_err());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&TenantId::new(7)).unwrap();
        assert_eq!(json, "7");

        let back: TenantId = serde_json::from_str("7").unwrap();
        assert_eq!(back, TenantId::new(7));
    }

    #[test]
    fn test_channel_ref_display() {
        let channel = ChannelRef::new(TenantId::new(1), ChannelId::new(2));
        assert_eq!(channel.to_string(), "1/2");
    }
}
