//! Signal type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TenantId;

/// The two named playback signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// A tenant's foreground session entered `Playing`
    PlaybackStarted,
    /// A tenant's foreground session returned to `Idle`
    PlaybackStopped,
}

impl SignalKind {
    /// Wire name of the signal
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::PlaybackStarted => "playback-started",
            SignalKind::PlaybackStopped => "playback-stopped",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One published signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// Tenant whose foreground session changed
    pub tenant: TenantId,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn now(kind: SignalKind, tenant: TenantId) -> Self {
        Self {
            kind,
            tenant,
            timestamp: Utc::now(),
        }
    }
}
