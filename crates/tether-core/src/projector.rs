// ── State projection ──
//
// Applies one inbound event to the mirrored slice of one key. Sequence
// operations require the slice to already hold an array; anything else
// is a projection error and leaves the slice exactly as it was.

use serde_json::Value;
use tracing::debug;

use tether_api::{Action, Endpoint, Event};

use crate::config::ReloadPolicy;
use crate::error::CoreError;
use crate::mapping::Key;
use crate::state::{MirroredState, Revision, SliceFailure};

/// What the caller has to do after an event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The slice was written.
    Applied,
    /// Nothing was written; fetch `Endpoint` and hand the result to
    /// [`StateProjector::apply_fetched`].
    Reload(Endpoint),
}

/// Outcome of completing a fetch for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Written(Revision),
    /// Dropped under [`ReloadPolicy::DiscardStale`].
    Discarded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StateProjector {
    policy: ReloadPolicy,
}

impl StateProjector {
    pub fn new(policy: ReloadPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    pub fn apply(
        &self,
        state: &mut MirroredState,
        key: &Key,
        event: Event,
    ) -> Result<Projection, CoreError> {
        let action = event.action();
        match event {
            Event::Replace { object } => {
                state.write(key.clone(), object);
            }
            Event::Prepend { object } => {
                let items = sequence(state, key, action)?;
                let mut next = Vec::with_capacity(items.len() + 1);
                next.push(object);
                next.extend(items.iter().cloned());
                state.write(key.clone(), Value::Array(next));
            }
            Event::Append { object } => {
                let mut next = sequence(state, key, action)?.clone();
                next.push(object);
                state.write(key.clone(), Value::Array(next));
            }
            Event::Remove { object } => {
                // Every structurally equal element goes, not just the first.
                let next: Vec<Value> = sequence(state, key, action)?
                    .iter()
                    .filter(|item| **item != object)
                    .cloned()
                    .collect();
                state.write(key.clone(), Value::Array(next));
            }
            Event::Reload { subject } => return Ok(Projection::Reload(subject)),
        }
        debug!(key = %key, %action, "event applied");
        Ok(Projection::Applied)
    }

    /// Complete a load or reload of `endpoint` for `key`.
    ///
    /// `requested_at` is the key's revision when the fetch was issued.
    /// A failure is recorded against the key and the old value is kept.
    pub fn apply_fetched(
        &self,
        state: &mut MirroredState,
        key: &Key,
        endpoint: Endpoint,
        requested_at: Revision,
        result: Result<Value, CoreError>,
    ) -> FetchOutcome {
        match result {
            Ok(value) => {
                if self.policy == ReloadPolicy::DiscardStale
                    && state.revision(key.as_str()) != requested_at
                {
                    debug!(key = %key, %endpoint, "discarding stale fetch result");
                    return FetchOutcome::Discarded;
                }
                FetchOutcome::Written(state.write(key.clone(), value))
            }
            Err(e) => {
                state.fail(key.clone(), SliceFailure::new(endpoint, e.to_string()));
                FetchOutcome::Failed
            }
        }
    }
}

fn sequence<'a>(
    state: &'a MirroredState,
    key: &Key,
    action: Action,
) -> Result<&'a Vec<Value>, CoreError> {
    match state.get(key.as_str()) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(CoreError::Projection {
            key: key.clone(),
            action,
            reason: format!("slice holds {}, not a sequence", kind(other)),
        }),
        None => Err(CoreError::Projection {
            key: key.clone(),
            action,
            reason: "slice has not been loaded".into(),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}
