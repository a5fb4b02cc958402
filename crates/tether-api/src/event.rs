// ── Push event wire types ──
//
// The backend publishes one frame per incremental change:
//   { "subject": "<endpoint>", "action": "append", "object": <any> }
// `Frame` is the envelope, `Event` the operation the engine applies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::endpoint::Endpoint;

/// The five update operations a frame can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Replace,
    Prepend,
    Append,
    Remove,
    Reload,
}

/// One incremental change to the resource behind an endpoint.
///
/// Serialized as `{ "action": ..., "object": ... }`, or
/// `{ "action": "reload", "subject": ... }` for reloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Event {
    /// Overwrite the slice entirely.
    Replace {
        #[serde(default)]
        object: Value,
    },
    /// Insert at the front of a sequence slice.
    Prepend {
        #[serde(default)]
        object: Value,
    },
    /// Insert at the back of a sequence slice.
    Append {
        #[serde(default)]
        object: Value,
    },
    /// Drop every structurally equal element of a sequence slice.
    Remove {
        #[serde(default)]
        object: Value,
    },
    /// Re-fetch `subject` and replace the slice with the result.
    Reload { subject: Endpoint },
}

impl Event {
    pub fn action(&self) -> Action {
        match self {
            Self::Replace { .. } => Action::Replace,
            Self::Prepend { .. } => Action::Prepend,
            Self::Append { .. } => Action::Append,
            Self::Remove { .. } => Action::Remove,
            Self::Reload { .. } => Action::Reload,
        }
    }
}

/// Envelope pushed over the event socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Endpoint the frame was published on.
    pub subject: Endpoint,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub object: Value,
}

impl Frame {
    pub fn new(subject: impl Into<Endpoint>, action: Action, object: Value) -> Self {
        Self {
            subject: subject.into(),
            action,
            object,
        }
    }

    /// Convert into the operation to apply.
    ///
    /// A `reload` frame re-fetches the endpoint it was published on.
    pub fn into_event(self) -> Event {
        match self.action {
            Action::Replace => Event::Replace {
                object: self.object,
            },
            Action::Prepend => Event::Prepend {
                object: self.object,
            },
            Action::Append => Event::Append {
                object: self.object,
            },
            Action::Remove => Event::Remove {
                object: self.object,
            },
            Action::Reload => Event::Reload {
                subject: self.subject,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_append_frame() {
        let frame: Frame = serde_json::from_value(json!({
            "subject": "account/btc/transactions",
            "action": "append",
            "object": { "id": "tx1" }
        }))
        .unwrap();

        assert_eq!(frame.subject.as_str(), "account/btc/transactions");
        assert_eq!(
            frame.into_event(),
            Event::Append {
                object: json!({ "id": "tx1" })
            }
        );
    }

    #[test]
    fn reload_frame_targets_its_subject() {
        let frame: Frame = serde_json::from_value(json!({
            "subject": "account/btc/status",
            "action": "reload"
        }))
        .unwrap();

        assert_eq!(
            frame.into_event(),
            Event::Reload {
                subject: Endpoint::from("account/btc/status")
            }
        );
    }

    #[test]
    fn event_uses_action_tag() {
        let event: Event =
            serde_json::from_value(json!({ "action": "remove", "object": "tx1" })).unwrap();
        assert_eq!(event.action(), Action::Remove);

        let reload = Event::Reload {
            subject: Endpoint::from("devices/registered"),
        };
        assert_eq!(
            serde_json::to_value(&reload).unwrap(),
            json!({ "action": "reload", "subject": "devices/registered" })
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<Frame, _> = serde_json::from_value(json!({
            "subject": "x",
            "action": "upsert",
            "object": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn action_display_matches_wire_name() {
        assert_eq!(Action::Prepend.to_string(), "prepend");
        assert_eq!("reload".parse::<Action>().unwrap(), Action::Reload);
    }
}
