//! Component tree — layered view over builder, code and session branches.
//!
//! A tree is an ordered list of branches, highest priority first. Reads merge
//! all branches so that a higher-priority branch shadows a lower one on the
//! same id. Writes target one branch (index 0 unless told otherwise) and mark
//! the tree dirty, which `fetch_updates` consumes.

pub mod branch;
pub mod component;
pub mod context;
pub mod error;
pub mod factory;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use buildstate_config::IngestMode;

pub use branch::{Branch, ComponentTreeBranch, SerialisedComponents, PAGE_TYPE, ROOT_ID};
pub use component::{generate_component_id, Component, Visibility, POSITIONLESS};
pub use error::{TreeError, TreeResult};

/// Outcome of `clear_children`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Descendants deleted from a frozen branch.
    pub removed: Vec<String>,
    /// Descendants that are builder-managed and were left in place.
    pub skipped: Vec<String>,
}

/// A layered component tree.
#[derive(Debug)]
pub struct ComponentTree {
    branches: Vec<ComponentTreeBranch>,
    updated: bool,
}

impl ComponentTree {
    /// Build a tree from branches listed highest priority first.
    pub fn new(branches: Vec<ComponentTreeBranch>) -> TreeResult<Self> {
        if branches.is_empty() {
            return Err(TreeError::EmptyTree);
        }
        Ok(Self {
            branches,
            updated: false,
        })
    }

    pub fn branches(&self) -> &[ComponentTreeBranch] {
        &self.branches
    }

    /// Merged view, lowest priority first so higher branches win on id.
    ///
    /// Rebuilt on every call; cache the result when iterating repeatedly.
    pub fn components(&self) -> IndexMap<String, Arc<Component>> {
        let mut all = IndexMap::new();
        for branch in self.branches.iter().rev() {
            for (id, component) in branch.components() {
                all.insert(id.clone(), Arc::clone(component));
            }
        }
        all
    }

    /// Sum of every branch's page counter.
    pub fn page_counter(&self) -> usize {
        self.branches.iter().map(|b| b.page_counter()).sum()
    }

    /// First match scanning branches in priority order.
    pub fn get_component(&self, component_id: &str) -> Option<&Arc<Component>> {
        self.branches
            .iter()
            .find_map(|b| b.get_component(component_id))
    }

    /// Attach a component to `branch`, or to the highest-priority branch.
    /// The tree is marked dirty only when the attach succeeds.
    pub fn attach(&mut self, component: Component, branch: Option<Branch>) -> TreeResult<()> {
        let index = self.branch_index(branch)?;
        self.branches[index].attach(component)?;
        self.updated = true;
        Ok(())
    }

    /// Replace the content of `branch` (or the highest-priority branch).
    pub fn ingest(
        &mut self,
        serialised: &SerialisedComponents,
        branch: Option<Branch>,
    ) -> TreeResult<()> {
        let index = self.branch_index(branch)?;
        self.branches[index].ingest(serialised)?;
        self.updated = true;
        Ok(())
    }

    /// Delete a component.
    ///
    /// Only components held by a frozen branch can be deleted; finding the id
    /// first in a mutable (builder-owned) branch is a protection error.
    pub fn delete_component(&mut self, component_id: &str) -> TreeResult<()> {
        for branch in self.branches.iter_mut() {
            if !branch.contains(component_id) {
                continue;
            }
            if !branch.is_frozen() {
                return Err(TreeError::Protected(component_id.to_string()));
            }
            branch.evict(component_id);
            self.updated = true;
            debug!(branch = %branch.id(), id = %component_id, "delete");
            return Ok(());
        }
        Err(TreeError::ComponentNotFound(component_id.to_string()))
    }

    /// Best-effort removal of every descendant of `component_id`.
    ///
    /// Protected descendants are logged and skipped; the tree is still marked
    /// dirty and any frozen copy of the skipped child is dropped. Never fails.
    pub fn clear_children(&mut self, component_id: &str) -> ClearReport {
        let mut report = ClearReport::default();

        for child in self.get_descendents(component_id) {
            match self.delete_component(&child.id) {
                Ok(()) => report.removed.push(child.id.clone()),
                Err(TreeError::Protected(_)) => {
                    warn!(
                        "failed to remove child with ID '{}' from component with ID '{}': \
                         child is a builder-managed component",
                        child.id, component_id
                    );
                    // keep going: later descendants may still be deletable
                    self.mark_updated();
                    for branch in self.branches.iter_mut().filter(|b| b.is_frozen()) {
                        branch.evict(&child.id);
                    }
                    report.skipped.push(child.id.clone());
                }
                Err(e) => debug!(child = %child.id, "clear_children: {e}"),
            }
        }

        report
    }

    /// Merge every branch's wire form, higher priority winning on id.
    pub fn to_dict(&self) -> TreeResult<Map<String, Value>> {
        let mut all = Map::new();
        for branch in self.branches.iter().rev() {
            all.extend(branch.to_dict()?);
        }
        Ok(all)
    }

    /// Id for the next code-managed page. Not collision-free under
    /// concurrent page creation; callers serialise page creation.
    pub fn next_page_id(&self) -> String {
        format!("page-{}", self.page_counter())
    }

    /// Full snapshot if anything changed since the last call, else `None`.
    /// The flag stays set when the snapshot cannot be built.
    pub fn fetch_updates(&mut self) -> TreeResult<Option<Map<String, Value>>> {
        if !self.updated {
            return Ok(None);
        }
        let snapshot = self.to_dict()?;
        self.updated = false;
        debug!(components = snapshot.len(), "fetch_updates");
        Ok(Some(snapshot))
    }

    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn mark_updated(&mut self) {
        self.updated = true;
    }

    /// Position for a new child of `parent_id`.
    ///
    /// Positionless children get the sentinel. Otherwise the child goes after
    /// the last positioned code-managed sibling, or first when there is none.
    /// Saturates at `i64::MAX`.
    pub fn determine_position(&self, parent_id: &str, is_positionless: bool) -> i64 {
        if is_positionless {
            return POSITIONLESS;
        }

        self.direct_children(parent_id)
            .iter()
            .filter(|c| c.is_code_managed && !c.is_positionless())
            .map(|c| c.position)
            .max()
            .map(|max| max.saturating_add(1).max(0))
            .unwrap_or(0)
    }

    /// Every component transitively parented by `parent_id`, pre-order.
    pub fn get_descendents(&self, parent_id: &str) -> Vec<Arc<Component>> {
        let all = self.components();
        let mut visited = HashSet::from([parent_id.to_string()]);
        let mut out = Vec::new();
        collect_descendents(&all, parent_id, &mut visited, &mut out);
        out
    }

    pub fn branch(&self, branch: Branch) -> TreeResult<&ComponentTreeBranch> {
        self.branches
            .iter()
            .find(|b| b.id() == branch)
            .ok_or(TreeError::BranchNotFound(branch))
    }

    pub fn branch_mut(&mut self, branch: Branch) -> TreeResult<&mut ComponentTreeBranch> {
        self.branches
            .iter_mut()
            .find(|b| b.id() == branch)
            .ok_or(TreeError::BranchNotFound(branch))
    }

    pub fn exists(&self, branch: Branch) -> bool {
        self.branches.iter().any(|b| b.id() == branch)
    }

    pub fn is_frozen(&self, branch: Branch) -> TreeResult<bool> {
        self.branch(branch).map(|b| b.is_frozen())
    }

    /// Apply one ingest mode to every branch.
    pub fn set_ingest_mode(&mut self, mode: IngestMode) {
        for branch in &mut self.branches {
            branch.set_ingest_mode(mode);
        }
    }

    /// Ancestor ids of `component_id`, immediate parent first.
    ///
    /// The chain stops at a component without a parent or at a parent id
    /// that is not in the tree. A repeated id is a `ParentCycle`.
    pub fn get_parent(&self, component_id: &str) -> TreeResult<Vec<String>> {
        let all = self.components();
        let mut current = all
            .get(component_id)
            .ok_or_else(|| TreeError::ComponentNotFound(component_id.to_string()))?;

        let mut seen = HashSet::from([component_id.to_string()]);
        let mut parents = Vec::new();
        while let Some(parent_id) = current.parent_id.as_deref() {
            if !seen.insert(parent_id.to_string()) {
                return Err(TreeError::ParentCycle(component_id.to_string()));
            }
            parents.push(parent_id.to_string());
            match all.get(parent_id) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(parents)
    }

    fn direct_children(&self, parent_id: &str) -> Vec<Arc<Component>> {
        self.components()
            .into_values()
            .filter(|c| c.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    fn branch_index(&self, branch: Option<Branch>) -> TreeResult<usize> {
        match branch {
            None => Ok(0),
            Some(branch) => self
                .branches
                .iter()
                .position(|b| b.id() == branch)
                .ok_or(TreeError::BranchNotFound(branch)),
        }
    }
}

fn collect_descendents(
    all: &IndexMap<String, Arc<Component>>,
    parent_id: &str,
    visited: &mut HashSet<String>,
    out: &mut Vec<Arc<Component>>,
) {
    for child in all
        .values()
        .filter(|c| c.parent_id.as_deref() == Some(parent_id))
    {
        if !visited.insert(child.id.clone()) {
            continue;
        }
        out.push(Arc::clone(child));
        collect_descendents(all, &child.id, visited, out);
    }
}
