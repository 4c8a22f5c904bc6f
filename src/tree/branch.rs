//! Component tree branches — one ownership layer of a component tree.
//!
//! Three kinds exist:
//! - `bmc`: builder-managed, edited via the visual builder, frozen once copied into a session
//! - `cmc`: code-managed, declared by application code
//! - `session`: created fresh per user session, always mutable, highest priority

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use buildstate_config::IngestMode;

use super::component::Component;
use super::error::{TreeError, TreeResult};

/// Id of the root component. `ingest` never removes it.
pub const ROOT_ID: &str = "root";

/// Component type that bumps the page counter on attach.
pub const PAGE_TYPE: &str = "page";

/// Ingest payload: component id → JSON object describing the component.
pub type SerialisedComponents = Map<String, Value>;

/// Branch kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// Builder-managed components.
    Bmc,
    /// Code-managed components.
    Cmc,
    /// Per-session components.
    Session,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Bmc => "bmc",
            Branch::Cmc => "cmc",
            Branch::Session => "session",
        }
    }

    /// Whether a freshly created branch of this kind starts frozen.
    /// Only the session-tree copy of `bmc` is frozen, and that copy is
    /// frozen explicitly by the session factory.
    pub fn default_frozen(&self) -> bool {
        match self {
            Branch::Bmc | Branch::Cmc | Branch::Session => false,
        }
    }

    /// Override priority: higher wins on id collision.
    pub fn priority(&self) -> u8 {
        match self {
            Branch::Session => 2,
            Branch::Cmc => 1,
            Branch::Bmc => 0,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bmc" => Ok(Branch::Bmc),
            "cmc" => Ok(Branch::Cmc),
            "session" => Ok(Branch::Session),
            _ => Err(format!("unknown branch: '{s}' (expected bmc/cmc/session)")),
        }
    }
}

/// One named collection of components.
///
/// `Clone` is a shallow copy: the id map is duplicated, the `Component`
/// records behind it are shared.
#[derive(Debug, Clone)]
pub struct ComponentTreeBranch {
    components: IndexMap<String, Arc<Component>>,
    page_counter: usize,
    branch: Branch,
    freeze: bool,
    ingest_mode: IngestMode,
}

impl ComponentTreeBranch {
    pub fn new(branch: Branch) -> Self {
        Self {
            components: IndexMap::new(),
            page_counter: 0,
            branch,
            freeze: branch.default_frozen(),
            ingest_mode: IngestMode::default(),
        }
    }

    pub fn frozen(mut self, freeze: bool) -> Self {
        self.freeze = freeze;
        self
    }

    pub fn with_ingest_mode(mut self, mode: IngestMode) -> Self {
        self.ingest_mode = mode;
        self
    }

    pub fn id(&self) -> Branch {
        self.branch
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze
    }

    pub fn set_frozen(&mut self, freeze: bool) {
        self.freeze = freeze;
    }

    pub fn ingest_mode(&self) -> IngestMode {
        self.ingest_mode
    }

    pub fn set_ingest_mode(&mut self, mode: IngestMode) {
        self.ingest_mode = mode;
    }

    /// Number of components of type "page" ever attached here.
    pub fn page_counter(&self) -> usize {
        self.page_counter
    }

    pub fn components(&self) -> &IndexMap<String, Arc<Component>> {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn contains(&self, component_id: &str) -> bool {
        self.components.contains_key(component_id)
    }

    pub fn get_component(&self, component_id: &str) -> Option<&Arc<Component>> {
        self.components.get(component_id)
    }

    /// Attach a new component. Rejected when frozen or when the id is taken.
    pub fn attach(&mut self, component: Component) -> TreeResult<()> {
        if self.freeze {
            return Err(TreeError::Frozen(self.branch));
        }
        if self.components.contains_key(&component.id) {
            return Err(TreeError::DuplicateId(component.id));
        }
        if component.kind == PAGE_TYPE {
            self.page_counter += 1;
        }
        debug!(branch = %self.branch, id = %component.id, kind = %component.kind, "attach");
        self.components
            .insert(component.id.clone(), Arc::new(component));
        Ok(())
    }

    /// Replace the whole component set with `serialised`.
    ///
    /// Ids absent from the payload are dropped, except `root`. Every entry is
    /// rebuilt from scratch. The payload is validated in full first, so an
    /// invalid entry leaves the branch untouched.
    pub fn ingest(&mut self, serialised: &SerialisedComponents) -> TreeResult<()> {
        if self.freeze {
            return Err(TreeError::Frozen(self.branch));
        }

        let mut parsed = Vec::with_capacity(serialised.len());
        for (id, entry) in serialised {
            parsed.push(Component::from_value(id, entry, self.ingest_mode)?);
        }

        let before = self.components.len();
        self.components
            .retain(|id, _| id == ROOT_ID || serialised.contains_key(id));
        let removed = before - self.components.len();

        for component in parsed {
            self.components
                .insert(component.id.clone(), Arc::new(component));
        }

        debug!(
            branch = %self.branch,
            ingested = serialised.len(),
            removed,
            "ingest"
        );
        Ok(())
    }

    /// Remove a component regardless of the freeze flag.
    pub(crate) fn evict(&mut self, component_id: &str) -> Option<Arc<Component>> {
        self.components.shift_remove(component_id)
    }

    /// Insert without any checks. Used to seed factory-built trees.
    pub(crate) fn seed(&mut self, component: Component) {
        if component.kind == PAGE_TYPE && !self.components.contains_key(&component.id) {
            self.page_counter += 1;
        }
        self.components
            .insert(component.id.clone(), Arc::new(component));
    }

    pub fn to_dict(&self) -> TreeResult<Map<String, Value>> {
        self.components
            .iter()
            .map(|(id, component)| Ok((id.clone(), Value::Object(component.to_dict()?))))
            .collect()
    }
}
