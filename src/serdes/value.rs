//! State values — the dynamic model of application state before it hits the wire.
//!
//! Every value knows its type chain: fully-qualified type names, most
//! specific first. Built-in variants report the Rust type they carry;
//! foreign objects (numeric arrays, plots, ...) report their own chain so the
//! registry can match them by name without depending on their crates.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::error::{SerdesError, SerdesResult};
use super::state::StateProxy;
use super::wrappers::{BytesWrapper, FileWrapper};

/// String-keyed mapping of state values, insertion ordered.
pub type StateMap = IndexMap<String, StateValue>;

/// An object from a library this crate does not link against.
///
/// Capabilities are probed lazily when a matching serializer runs; an object
/// that lacks the one its serializer needs is passed through unchanged.
pub trait ForeignObject: fmt::Debug + Send + Sync {
    /// Fully-qualified type names, most specific first.
    fn type_chain(&self) -> Vec<String>;

    /// Flattened element list (N-dimensional arrays).
    fn to_list(&self) -> Option<Vec<StateValue>> {
        None
    }

    /// Native JSON export (figure libraries that speak JSON).
    fn to_json(&self) -> Option<String> {
        None
    }

    /// PNG rendering (raster figure libraries).
    fn render_png(&self) -> Option<Vec<u8>> {
        None
    }

    /// Numeric scalar value.
    fn to_f64(&self) -> Option<f64> {
        None
    }
}

/// A piece of application state.
#[derive(Debug, Clone)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<StateValue>),
    Map(StateMap),
    State(StateProxy),
    File(FileWrapper),
    Binary(BytesWrapper),
    Object(Arc<dyn ForeignObject>),
}

impl StateValue {
    pub fn object(obj: impl ForeignObject + 'static) -> Self {
        StateValue::Object(Arc::new(obj))
    }

    /// Type names for registry lookup, most specific first.
    pub fn type_chain(&self) -> Vec<String> {
        let name = match self {
            StateValue::Null => type_name::<()>(),
            StateValue::Bool(_) => type_name::<bool>(),
            StateValue::Int(_) => type_name::<i64>(),
            StateValue::Float(_) => type_name::<f64>(),
            StateValue::Str(_) => type_name::<String>(),
            StateValue::Bytes(_) => type_name::<Vec<u8>>(),
            StateValue::Date(_) => type_name::<NaiveDate>(),
            StateValue::DateTime(_) => type_name::<NaiveDateTime>(),
            StateValue::List(_) => type_name::<Vec<StateValue>>(),
            StateValue::Map(_) => type_name::<StateMap>(),
            StateValue::State(_) => type_name::<StateProxy>(),
            StateValue::File(_) => type_name::<FileWrapper>(),
            StateValue::Binary(_) => type_name::<BytesWrapper>(),
            StateValue::Object(obj) => return obj.type_chain(),
        };
        vec![name.to_string()]
    }

    /// Most specific type name.
    pub fn type_name(&self) -> String {
        self.type_chain()
            .into_iter()
            .next()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Lift a JSON value. Integers that fit `i64` stay integers.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => StateValue::Null,
            Value::Bool(b) => StateValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => StateValue::Int(i),
                None => StateValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => StateValue::Str(s.clone()),
            Value::Array(items) => StateValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(fields) => StateValue::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Lower to JSON. Only wire primitives convert; anything else must go
    /// through `serialise` first.
    pub fn to_json(&self) -> SerdesResult<Value> {
        match self {
            StateValue::Null => Ok(Value::Null),
            StateValue::Bool(b) => Ok(Value::Bool(*b)),
            StateValue::Int(i) => Ok(Value::from(*i)),
            StateValue::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or(SerdesError::NonFinite(*f)),
            StateValue::Str(s) => Ok(Value::String(s.clone())),
            StateValue::List(items) => items
                .iter()
                .map(Self::to_json)
                .collect::<SerdesResult<Vec<_>>>()
                .map(Value::Array),
            StateValue::Map(fields) => {
                let mut out = Map::new();
                for (k, v) in fields {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(Value::Object(out))
            }
            other => Err(SerdesError::NotWireSafe(other.type_name())),
        }
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        use StateValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (State(a), State(b)) => a == b,
            (File(a), File(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (Object(a), Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        StateValue::Int(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Float(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Str(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Str(v)
    }
}

impl From<Vec<u8>> for StateValue {
    fn from(v: Vec<u8>) -> Self {
        StateValue::Bytes(v)
    }
}

impl From<NaiveDate> for StateValue {
    fn from(v: NaiveDate) -> Self {
        StateValue::Date(v)
    }
}

impl From<NaiveDateTime> for StateValue {
    fn from(v: NaiveDateTime) -> Self {
        StateValue::DateTime(v)
    }
}

impl From<StateMap> for StateValue {
    fn from(v: StateMap) -> Self {
        StateValue::Map(v)
    }
}

impl From<StateProxy> for StateValue {
    fn from(v: StateProxy) -> Self {
        StateValue::State(v)
    }
}

impl From<FileWrapper> for StateValue {
    fn from(v: FileWrapper) -> Self {
        StateValue::File(v)
    }
}

impl From<BytesWrapper> for StateValue {
    fn from(v: BytesWrapper) -> Self {
        StateValue::Binary(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Widget;

    impl ForeignObject for Widget {
        fn type_chain(&self) -> Vec<String> {
            vec!["vendor::Widget".into(), "vendor::Base".into()]
        }
    }

    #[test]
    fn builtin_chains_use_rust_type_names() {
        assert_eq!(StateValue::Int(1).type_chain(), vec!["i64".to_string()]);
        assert_eq!(StateValue::Float(1.0).type_name(), "f64");
        assert_eq!(
            StateValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()).type_name(),
            type_name::<NaiveDate>()
        );
    }

    #[test]
    fn foreign_objects_report_their_own_chain() {
        let v = StateValue::object(Widget);
        assert_eq!(v.type_chain(), vec!["vendor::Widget", "vendor::Base"]);
        assert_eq!(v.type_name(), "vendor::Widget");
    }

    #[test]
    fn json_lifts_and_lowers() {
        let src = json!({"n": 1, "f": 1.5, "s": "x", "l": [true, null], "m": {"k": -3}});
        let value = StateValue::from_json(&src);
        match &value {
            StateValue::Map(m) => {
                assert_eq!(m["n"], StateValue::Int(1));
                assert_eq!(m["f"], StateValue::Float(1.5));
            }
            other => panic!("expected map, got {other:?}"),
        }
        assert_eq!(value.to_json().unwrap(), src);
    }

    #[test]
    fn non_primitives_are_not_wire_safe() {
        let err = StateValue::Bytes(vec![1]).to_json().unwrap_err();
        assert!(matches!(err, SerdesError::NotWireSafe(_)));
        let err = StateValue::Float(f64::NAN).to_json().unwrap_err();
        assert!(matches!(err, SerdesError::NonFinite(_)));
        let err = StateValue::List(vec![StateValue::object(Widget)])
            .to_json()
            .unwrap_err();
        assert!(err.to_string().contains("vendor::Widget"));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = StateValue::object(Widget);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, StateValue::object(Widget));
    }
}
