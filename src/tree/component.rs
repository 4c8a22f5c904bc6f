//! Component — a single UI node record.
//!
//! Components are immutable by convention once attached: branches hand them
//! out behind `Arc`, and session trees share them with the base tree. Any
//! change goes through a full replacement (`ingest`), never an in-place edit.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use buildstate_config::IngestMode;

use super::error::{TreeError, TreeResult};

/// Position sentinel for components excluded from sibling ordering.
pub const POSITIONLESS: i64 = -2;

/// Wire names of every component field, in emission order.
pub const FIELDS: &[&str] = &[
    "id",
    "type",
    "content",
    "isCodeManaged",
    "position",
    "parentId",
    "handlers",
    "visible",
    "binding",
];

/// Generate a fresh component id (UUIDv4).
pub fn generate_component_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Visibility of a component: a fixed flag or a dynamic expression
/// evaluated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Visibility {
    Bool(bool),
    Expression(String),
}

impl From<bool> for Visibility {
    fn from(v: bool) -> Self {
        Visibility::Bool(v)
    }
}

impl From<&str> for Visibility {
    fn from(v: &str) -> Self {
        Visibility::Expression(v.to_string())
    }
}

/// A UI component definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default = "generate_component_id")]
    pub id: String,
    /// Widget kind ("root", "page", "text", ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_code_managed: bool,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handlers: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Map<String, Value>>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Component {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            content: Map::new(),
            is_code_managed: false,
            position: 0,
            parent_id: None,
            handlers: None,
            visible: None,
            binding: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    pub fn with_content(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(key.into(), value.into());
        self
    }

    pub fn code_managed(mut self) -> Self {
        self.is_code_managed = true;
        self
    }

    pub fn with_handlers(mut self, handlers: IndexMap<String, String>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn with_visible(mut self, visible: impl Into<Visibility>) -> Self {
        self.visible = Some(visible.into());
        self
    }

    pub fn with_binding(mut self, binding: Map<String, Value>) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn is_positionless(&self) -> bool {
        self.position == POSITIONLESS
    }

    /// Build a component from one entry of an ingest payload.
    ///
    /// The map key is the component id when the entry has none; an explicit
    /// id that disagrees with its key is rejected.
    pub fn from_value(key: &str, value: &Value, mode: IngestMode) -> TreeResult<Self> {
        let Value::Object(fields) = value else {
            return Err(invalid(key, "expected a JSON object"));
        };

        if mode == IngestMode::Strict {
            if let Some(unknown) = fields.keys().find(|k| !FIELDS.contains(&k.as_str())) {
                return Err(invalid(key, format!("unknown field '{unknown}'")));
            }
        }

        let mut fields = fields.clone();
        match fields.get("id") {
            None | Some(Value::Null) => {
                fields.insert("id".into(), Value::String(key.to_string()));
            }
            Some(Value::String(id)) if id == key => {}
            Some(other) => {
                return Err(invalid(key, format!("id {other} does not match its key")));
            }
        }

        serde_json::from_value(Value::Object(fields)).map_err(|e| invalid(key, e.to_string()))
    }

    /// Wire form: every required field, optional fields only when set.
    pub fn to_dict(&self) -> TreeResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(invalid(&self.id, format!("serialised to {other} instead of an object"))),
        }
    }
}

fn invalid(id: &str, reason: impl Into<String>) -> TreeError {
    TreeError::InvalidComponent {
        id: id.to_string(),
        reason: reason.into(),
    }
}
