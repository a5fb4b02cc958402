// ── Runtime engine configuration ──
//
// These types describe *how* a subscribed view behaves. They never touch
// disk; tether-config builds them from TOML and hands them in.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What happens when a reload fetch completes after newer writes.
///
/// Events for a key are applied in delivery order, but a reload is a
/// separate asynchronous completion and can resolve after later events.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReloadPolicy {
    /// The completion overwrites the slice regardless of what happened since.
    #[default]
    LastWriteWins,
    /// The completion is dropped if the slice was written after the fetch
    /// was requested.
    DiscardStale,
}

/// Behaviour switches for one subscribed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Hide the view until every key has completed its initial fetch.
    pub wait_for_all: bool,
    /// Skip the initial fetch entirely and only subscribe. Bypasses gating.
    pub subscribe_without_loading: bool,
    pub reload_policy: ReloadPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            wait_for_all: true,
            subscribe_without_loading: false,
            reload_policy: ReloadPolicy::default(),
        }
    }
}
