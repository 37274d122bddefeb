use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared state of a component keyed by property name
pub type StateMap = Map<String, Value>;

/// Everything a component carries from one request to the next.
///
/// Besides the declared properties it remembers the instance key and which
/// properties the user has touched, so validation keeps surfacing the same
/// errors across round trips.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentState {
    #[serde(default)]
    pub state: StateMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub touched: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub model_touched: bool,
}

impl ComponentState {
    pub fn from_state(state: StateMap) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Opaque, tamper-evident serialized [`ComponentState`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateToken(String);

impl StateToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for StateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn expect_object(value: Value) -> Option<StateMap> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
