//! State proxy — nested application state with mutation tracking.
//!
//! Keys are coerced to strings on the way in. Plain mappings stored in a
//! proxy become nested proxies, so a state subtree always serialises as
//! state rather than as an opaque mapping.

use indexmap::IndexSet;

use super::value::{StateMap, StateValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateProxy {
    state: StateMap,
    mutated: IndexSet<String>,
}

impl StateProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a proxy from a mapping; nested mappings become nested proxies.
    /// Nothing is recorded as mutated.
    pub fn from_map(map: StateMap) -> Self {
        let state = map
            .into_iter()
            .map(|(k, v)| (k, nest(v)))
            .collect();
        Self {
            state,
            mutated: IndexSet::new(),
        }
    }

    pub fn set(&mut self, key: impl ToString, value: impl Into<StateValue>) {
        let key = key.to_string();
        self.state.insert(key.clone(), nest(value.into()));
        self.mutated.insert(key);
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.state.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        let removed = self.state.shift_remove(key);
        if removed.is_some() {
            self.mutated.insert(key.to_string());
        }
        removed
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.state.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Plain mapping of the current state (nested proxies stay proxies).
    pub fn to_dict(&self) -> StateMap {
        self.state.clone()
    }

    /// Keys changed since the last call, in first-change order.
    pub fn take_mutations(&mut self) -> Vec<String> {
        self.mutated.drain(..).collect()
    }
}

fn nest(value: StateValue) -> StateValue {
    match value {
        StateValue::Map(map) => StateValue::State(StateProxy::from_map(map)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_coerced_to_strings() {
        let mut s = StateProxy::new();
        s.set(7, "seven");
        assert_eq!(s.get("7"), Some(&StateValue::Str("seven".into())));
    }

    #[test]
    fn nested_maps_become_proxies() {
        let mut inner = StateMap::new();
        inner.insert("x".into(), StateValue::Int(1));
        let mut s = StateProxy::new();
        s.set("pos", inner);
        match s.get("pos") {
            Some(StateValue::State(p)) => assert_eq!(p.get("x"), Some(&StateValue::Int(1))),
            other => panic!("expected nested proxy, got {other:?}"),
        }
    }

    #[test]
    fn mutations_are_tracked_and_drained() {
        let mut s = StateProxy::new();
        s.set("a", 1i64);
        s.set("b", 2i64);
        s.set("a", 3i64);
        assert_eq!(s.take_mutations(), vec!["a", "b"]);
        assert!(s.take_mutations().is_empty());

        assert!(s.remove("b").is_some());
        assert!(s.remove("missing").is_none());
        assert_eq!(s.take_mutations(), vec!["b"]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn from_map_records_no_mutations() {
        let mut map = StateMap::new();
        map.insert("k".into(), StateValue::Bool(true));
        let mut s = StateProxy::from_map(map);
        assert!(s.contains_key("k"));
        assert!(s.take_mutations().is_empty());
        assert_eq!(s.keys().collect::<Vec<_>>(), vec!["k"]);
    }
}
