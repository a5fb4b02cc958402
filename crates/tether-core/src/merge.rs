// ── Merge gate ──
//
// Builds the state handed to the view: mirrored slices overlaid with the
// view's own props. Props always win on a name collision, so a parent can
// pin a value the backend would otherwise supply.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::mapping::Key;
use crate::state::{MirroredState, SliceFailure};

/// Properties passed into a view from its parent.
pub type Props = Map<String, Value>;

/// The state a view renders from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExposedState {
    pub values: Props,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub failures: IndexMap<Key, SliceFailure>,
    pub ready: bool,
}

impl ExposedState {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn failure(&self, key: &str) -> Option<&SliceFailure> {
        self.failures.get(key)
    }
}

pub struct MergeGate;

impl MergeGate {
    /// Overlay `props` on the mirrored slices.
    pub fn merge(mirrored: &MirroredState, props: &Props, ready: bool) -> ExposedState {
        let mut values = props.clone();
        for (key, value) in mirrored.iter() {
            if !props.contains_key(key.as_str()) {
                values.insert(key.to_string(), value.clone());
            }
        }

        ExposedState {
            values,
            failures: mirrored.failures().clone(),
            ready,
        }
    }
}
