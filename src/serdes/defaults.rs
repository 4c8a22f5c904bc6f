//! Core serializers installed in every fresh registry.
//!
//! Built-in variants are matched by their Rust type. Third-party objects are
//! matched by name only; their capability (list export, JSON export, PNG
//! rendering) is probed when the serializer runs, and a value lacking it is
//! passed through.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use super::state::StateProxy;
use super::value::{StateMap, StateValue};
use super::wrappers::{BytesWrapper, FileWrapper};
use super::{Serdes, SerdesRegistry, TypeMatcher};

/// Numeric scalar from an array library.
pub const NUMERIC_SCALAR: &str = "ndarray::Scalar";
/// N-dimensional array.
pub const NDARRAY: &str = "ndarray::ArrayBase";
/// Figure rendered to PNG.
pub const RASTER_FIGURE: &str = "plotters::Figure";
/// Figure with a native JSON export.
pub const JSON_FIGURE: &str = "plotly::Plot";

/// MIME type for mappings wrapped as binary.
pub const MAPPING_MIME: &str = "application/json";

pub(super) fn register_core(registry: &mut SerdesRegistry) {
    registry.register(Serdes::new(TypeMatcher::of::<StateProxy>()).serializer(serialise_state));
    registry.register(Serdes::new(TypeMatcher::of::<FileWrapper>()).serializer(|_, v| match v {
        StateValue::File(f) => StateValue::Str(f.get_as_dataurl()),
        other => other.clone(),
    }));
    registry.register(Serdes::new(TypeMatcher::of::<BytesWrapper>()).serializer(|_, v| match v {
        StateValue::Binary(b) => StateValue::Str(b.get_as_dataurl()),
        other => other.clone(),
    }));
    registry.register(Serdes::new(TypeMatcher::of::<NaiveDateTime>()).serializer(|_, v| match v {
        StateValue::DateTime(dt) => StateValue::Str(dt.to_string()),
        other => other.clone(),
    }));
    registry.register(Serdes::new(TypeMatcher::of::<NaiveDate>()).serializer(|_, v| match v {
        StateValue::Date(d) => StateValue::Str(d.to_string()),
        other => other.clone(),
    }));
    // integers have no NaN; registered so overrides have something to replace
    registry.register(Serdes::new(TypeMatcher::of::<i64>()));
    registry.register(Serdes::new(TypeMatcher::of::<f64>()).serializer(|_, v| match v {
        StateValue::Float(f) => wire_float(*f),
        other => other.clone(),
    }));
    registry.register(Serdes::new(TypeMatcher::of::<Vec<u8>>()).serializer(|_, v| match v {
        StateValue::Bytes(b) => StateValue::Str(BytesWrapper::new(b.clone()).get_as_dataurl()),
        other => other.clone(),
    }));
    registry.register(Serdes::new(TypeMatcher::of::<StateMap>()).serializer(serialise_mapping));
    registry.register(
        Serdes::new(TypeMatcher::of::<Vec<StateValue>>()).serializer(|registry, v| match v {
            StateValue::List(items) => {
                StateValue::List(items.iter().map(|i| registry.serialise(i)).collect())
            }
            other => other.clone(),
        }),
    );

    registry.register(Serdes::new(NUMERIC_SCALAR).serializer(|_, v| {
        probe(v, "to_f64", |obj| obj.to_f64().map(wire_float))
    }));
    registry.register(Serdes::new(RASTER_FIGURE).serializer(|_, v| {
        probe(v, "render_png", |obj| {
            obj.render_png().map(|png| {
                StateValue::Str(FileWrapper::new(png, Some("image/png")).get_as_dataurl())
            })
        })
    }));
    registry.register(Serdes::new(JSON_FIGURE).serializer(|_, v| {
        probe(v, "to_json", |obj| obj.to_json().map(StateValue::Str))
    }));
    registry.register(Serdes::new(NDARRAY).serializer(|registry, v| {
        probe(v, "to_list", |obj| {
            obj.to_list().map(|items| {
                StateValue::List(items.iter().map(|i| registry.serialise(i)).collect())
            })
        })
    }));
}

/// JSON has no NaN.
fn wire_float(f: f64) -> StateValue {
    if f.is_nan() {
        StateValue::Null
    } else {
        StateValue::Float(f)
    }
}

fn serialise_state(registry: &SerdesRegistry, value: &StateValue) -> StateValue {
    match value {
        StateValue::State(proxy) => StateValue::Map(
            proxy
                .to_dict()
                .iter()
                .map(|(k, v)| (k.to_string(), registry.serialise(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Mappings are serialised, JSON-encoded and shipped as a data URL.
fn serialise_mapping(registry: &SerdesRegistry, value: &StateValue) -> StateValue {
    let StateValue::Map(map) = value else {
        return value.clone();
    };

    let serialised = StateValue::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), registry.serialise(v)))
            .collect(),
    );
    let encoded = serialised
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::to_vec(&json).map_err(|e| e.to_string()));

    match encoded {
        Ok(bytes) => StateValue::Str(BytesWrapper::with_mime(bytes, MAPPING_MIME).get_as_dataurl()),
        Err(e) => {
            warn!("mapping left unwrapped: {e}");
            value.clone()
        }
    }
}

/// Run a capability of a foreign object, passing the value through when the
/// object does not have it.
fn probe(
    value: &StateValue,
    capability: &str,
    f: impl FnOnce(&dyn super::ForeignObject) -> Option<StateValue>,
) -> StateValue {
    let StateValue::Object(obj) = value else {
        return value.clone();
    };
    match f(obj.as_ref()) {
        Some(out) => out,
        None => {
            debug!(
                type_name = %value.type_name(),
                capability,
                "foreign object lacks capability, passing through"
            );
            value.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serdes::ForeignObject;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    #[derive(Debug)]
    struct Array(Vec<f64>);

    impl ForeignObject for Array {
        fn type_chain(&self) -> Vec<String> {
            vec![NDARRAY.into()]
        }
        fn to_list(&self) -> Option<Vec<StateValue>> {
            Some(self.0.iter().copied().map(StateValue::Float).collect())
        }
    }

    #[derive(Debug)]
    struct Scalar(f64);

    impl ForeignObject for Scalar {
        fn type_chain(&self) -> Vec<String> {
            vec![NUMERIC_SCALAR.into()]
        }
        fn to_f64(&self) -> Option<f64> {
            Some(self.0)
        }
    }

    /// A dashboard subclass of the raster figure type.
    #[derive(Debug)]
    struct Dashboard;

    impl ForeignObject for Dashboard {
        fn type_chain(&self) -> Vec<String> {
            vec!["app::Dashboard".into(), RASTER_FIGURE.into()]
        }
        fn render_png(&self) -> Option<Vec<u8>> {
            Some(vec![0x89, b'P', b'N', b'G'])
        }
    }

    #[derive(Debug)]
    struct Plot;

    impl ForeignObject for Plot {
        fn type_chain(&self) -> Vec<String> {
            vec![JSON_FIGURE.into()]
        }
        fn to_json(&self) -> Option<String> {
            Some(r#"{"data":[]}"#.into())
        }
    }

    /// Claims to be a figure but cannot render.
    #[derive(Debug)]
    struct BrokenFigure;

    impl ForeignObject for BrokenFigure {
        fn type_chain(&self) -> Vec<String> {
            vec![RASTER_FIGURE.into()]
        }
    }

    fn registry() -> SerdesRegistry {
        SerdesRegistry::with_defaults()
    }

    #[test]
    fn nan_becomes_null() {
        assert_eq!(registry().serialise(&StateValue::Float(f64::NAN)), StateValue::Null);
        assert_eq!(registry().serialise(&StateValue::Float(1.5)), StateValue::Float(1.5));
    }

    #[test]
    fn ints_pass_through() {
        assert_eq!(registry().serialise(&StateValue::Int(42)), StateValue::Int(42));
    }

    #[test]
    fn dates_render_iso() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            registry().serialise(&StateValue::Date(d)),
            StateValue::Str("2024-01-05".into())
        );
        let dt = d.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(
            registry().serialise(&StateValue::DateTime(dt)),
            StateValue::Str("2024-01-05 10:30:00".into())
        );
    }

    #[test]
    fn bytes_become_data_urls() {
        assert_eq!(
            registry().serialise(&StateValue::Bytes(b"hi".to_vec())),
            StateValue::Str("data:application/octet-stream;base64,aGk=".into())
        );
        assert_eq!(
            registry().serialise(&StateValue::File(FileWrapper::new(b"hi".to_vec(), Some("text/plain")))),
            StateValue::Str("data:text/plain;base64,aGk=".into())
        );
        assert_eq!(
            registry().serialise(&StateValue::Binary(BytesWrapper::new(b"hi".to_vec()))),
            StateValue::Str("data:application/octet-stream;base64,aGk=".into())
        );
    }

    #[test]
    fn mapping_becomes_data_url() {
        let mut map = StateMap::new();
        map.insert("a".into(), StateValue::Int(1));
        let out = registry().serialise(&StateValue::Map(map));
        let StateValue::Str(url) = out else {
            panic!("expected a data URL, got {out:?}");
        };
        let payload = url.strip_prefix("data:application/json;base64,").unwrap();
        let decoded: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(payload).unwrap()).unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[test]
    fn mapping_with_opaque_object_is_left_alone() {
        let mut map = StateMap::new();
        map.insert("fig".into(), StateValue::object(BrokenFigure));
        let value = StateValue::Map(map);
        assert_eq!(registry().serialise(&value), value);
    }

    #[test]
    fn state_serialises_recursively_to_plain_map() {
        let mut inner = StateMap::new();
        inner.insert("ratio".into(), StateValue::Float(f64::NAN));
        let mut state = StateProxy::new();
        state.set("counter", 3i64);
        state.set("nested", inner);
        state.set("when", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let out = registry().serialise(&StateValue::State(state));
        assert_eq!(
            out.to_json().unwrap(),
            json!({"counter": 3, "nested": {"ratio": null}, "when": "2024-02-29"})
        );
    }

    #[test]
    fn lists_serialise_items() {
        let list = StateValue::List(vec![StateValue::Float(f64::NAN), StateValue::Int(2)]);
        assert_eq!(
            registry().serialise(&list),
            StateValue::List(vec![StateValue::Null, StateValue::Int(2)])
        );
    }

    #[test]
    fn foreign_array_flattens_to_list() {
        let out = registry().serialise(&StateValue::object(Array(vec![1.0, f64::NAN])));
        assert_eq!(out, StateValue::List(vec![StateValue::Float(1.0), StateValue::Null]));
    }

    #[test]
    fn foreign_scalar_becomes_float() {
        assert_eq!(
            registry().serialise(&StateValue::object(Scalar(0.25))),
            StateValue::Float(0.25)
        );
    }

    #[test]
    fn figure_subclass_renders_png() {
        assert_eq!(
            registry().serialise(&StateValue::object(Dashboard)),
            StateValue::Str("data:image/png;base64,iVBORw==".into())
        );
    }

    #[test]
    fn json_figure_exports_json() {
        assert_eq!(
            registry().serialise(&StateValue::object(Plot)),
            StateValue::Str(r#"{"data":[]}"#.into())
        );
    }

    #[test]
    fn missing_capability_passes_through() {
        let value = StateValue::object(BrokenFigure);
        assert_eq!(registry().serialise(&value), value);
    }

    #[test]
    fn strings_and_bools_are_untouched() {
        assert_eq!(registry().serialise(&StateValue::from("x")), StateValue::from("x"));
        assert_eq!(registry().serialise(&StateValue::Bool(true)), StateValue::Bool(true));
        assert_eq!(registry().serialise(&StateValue::Null), StateValue::Null);
    }
}
