//! Out-of-band block state: orientation, power level, growth stage and the like.
//!
//! Stored sparsely per chunk. A position can be in one of three states, see
//! [`StateEntry`].

use std::collections::BTreeMap;

/// One property value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateValue {
    /// Boolean property (e.g. `powered`).
    Bool(bool),
    /// Integer property (e.g. `age`, `power`).
    Int(i64),
    /// Enumerated or free-form property (e.g. `facing = "north"`).
    Text(String),
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// Named properties attached to a single block position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockState {
    properties: BTreeMap<String, StateValue>,
}

impl BlockState {
    /// Creates an empty property bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<StateValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a property, returning the previous value.
    pub fn set(&mut self, key: &str, value: impl Into<StateValue>) -> Option<StateValue> {
        self.properties.insert(key.to_owned(), value.into())
    }

    /// Gets a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.properties.get(key)
    }

    /// Removes a property.
    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.properties.remove(key)
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True if no property is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Extra-state lookup result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateEntry<'a> {
    /// No state was ever recorded at this position.
    Absent,
    /// State existed and was explicitly cleared.
    Cleared,
    /// State is present.
    Present(&'a BlockState),
}

impl<'a> StateEntry<'a> {
    /// The state, if present.
    #[must_use]
    pub const fn present(self) -> Option<&'a BlockState> {
        match self {
            Self::Present(state) => Some(state),
            Self::Absent | Self::Cleared => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_bag() {
        let mut state = BlockState::new().with("facing", "north").with("age", 3i64);
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("facing"), Some(&StateValue::Text("north".into())));
        assert_eq!(state.set("age", 4i64), Some(StateValue::Int(3)));
        assert_eq!(state.remove("facing"), Some(StateValue::Text("north".into())));
        let keys: Vec<&str> = state.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["age"]);
    }

    #[test]
    fn test_entry_present() {
        let state = BlockState::new().with("powered", true);
        assert_eq!(StateEntry::Present(&state).present(), Some(&state));
        assert_eq!(StateEntry::Cleared.present(), None);
        assert_eq!(StateEntry::Absent.present(), None);
    }
}
