//! Tree factories — the base tree and per-session trees derived from it.

use std::sync::Arc;

use super::branch::{Branch, ComponentTreeBranch, SerialisedComponents, ROOT_ID};
use super::component::Component;
use super::error::{TreeError, TreeResult};
use super::ComponentTree;

/// Base tree shared by every session: `[cmc, bmc]`, with the root component
/// already in `bmc`.
pub fn build_base_component_tree() -> ComponentTree {
    let mut bmc = ComponentTreeBranch::new(Branch::Bmc);
    bmc.seed(Component::new(ROOT_ID, "root"));
    let cmc = ComponentTreeBranch::new(Branch::Cmc);

    ComponentTree {
        branches: vec![cmc, bmc],
        updated: false,
    }
}

/// Session tree: `[session, cmc, bmc]`.
///
/// `cmc` and `bmc` are shallow copies of the base branches: separate id maps,
/// shared `Component` records. The `bmc` copy is frozen. The session branch
/// starts empty and takes the `cmc` branch's ingest mode.
pub fn build_session_component_tree(base: &ComponentTree) -> TreeResult<ComponentTree> {
    let cmc = base.branch(Branch::Cmc)?.clone();
    let mut bmc = base.branch(Branch::Bmc)?.clone();
    bmc.set_frozen(true);

    let session = ComponentTreeBranch::new(Branch::Session).with_ingest_mode(cmc.ingest_mode());

    Ok(ComponentTree {
        branches: vec![session, cmc, bmc],
        updated: false,
    })
}

/// Replace the builder-managed components of `tree`.
///
/// Only legal on a tree whose `bmc` branch is live (the base tree); a session
/// tree's frozen copy is refused.
pub fn ingest_bmc_component_tree(
    tree: &mut ComponentTree,
    components: &SerialisedComponents,
) -> TreeResult<()> {
    if !tree.exists(Branch::Bmc) {
        return Err(TreeError::BranchNotFound(Branch::Bmc));
    }
    if tree.is_frozen(Branch::Bmc)? {
        return Err(TreeError::Frozen(Branch::Bmc));
    }
    tree.ingest(components, Some(Branch::Bmc))
}

/// Components of the code-managed branch.
pub fn cmc_components_list(tree: &ComponentTree) -> TreeResult<Vec<Arc<Component>>> {
    Ok(tree.branch(Branch::Cmc)?.components().values().cloned().collect())
}

/// Components of the session branch.
pub fn session_components_list(tree: &ComponentTree) -> TreeResult<Vec<Arc<Component>>> {
    Ok(tree
        .branch(Branch::Session)?
        .components()
        .values()
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildstate_config::IngestMode;
    use serde_json::{json, Value};

    fn payload(v: Value) -> SerialisedComponents {
        match v {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn base_tree_shape() {
        let tree = build_base_component_tree();
        let ids: Vec<Branch> = tree.branches().iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec![Branch::Cmc, Branch::Bmc]);
        assert_eq!(tree.get_component("root").unwrap().kind, "root");
        assert!(tree.branch(Branch::Bmc).unwrap().contains("root"));
        assert!(!tree.is_frozen(Branch::Bmc).unwrap());
        assert!(!tree.is_updated());
    }

    #[test]
    fn session_tree_shape() {
        let base = build_base_component_tree();
        let session = build_session_component_tree(&base).unwrap();
        let ids: Vec<Branch> = session.branches().iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec![Branch::Session, Branch::Cmc, Branch::Bmc]);
        assert!(session.is_frozen(Branch::Bmc).unwrap());
        assert!(!session.is_frozen(Branch::Cmc).unwrap());
        assert!(!session.is_frozen(Branch::Session).unwrap());
        assert!(session.branch(Branch::Session).unwrap().is_empty());
        // freezing the copy leaves the base live
        assert!(!base.is_frozen(Branch::Bmc).unwrap());
    }

    #[test]
    fn session_copy_shares_components_not_containers() {
        let mut base = build_base_component_tree();
        base.attach(Component::new("code", "text"), Some(Branch::Cmc))
            .unwrap();
        let session = build_session_component_tree(&base).unwrap();

        assert!(Arc::ptr_eq(
            base.get_component("code").unwrap(),
            session.get_component("code").unwrap()
        ));

        base.attach(Component::new("later", "text"), Some(Branch::Cmc))
            .unwrap();
        assert!(session.get_component("later").is_none());
    }

    #[test]
    fn session_attach_defaults_to_session_branch() {
        let base = build_base_component_tree();
        let mut session = build_session_component_tree(&base).unwrap();
        session
            .attach(Component::new("mine", "text"), None)
            .unwrap();
        assert_eq!(session_components_list(&session).unwrap().len(), 1);
        assert!(base.get_component("mine").is_none());
    }

    #[test]
    fn session_branch_inherits_ingest_mode() {
        let mut base = build_base_component_tree();
        base.set_ingest_mode(IngestMode::Strict);
        let session = build_session_component_tree(&base).unwrap();
        assert_eq!(
            session.branch(Branch::Session).unwrap().ingest_mode(),
            IngestMode::Strict
        );
    }

    #[test]
    fn session_needs_cmc_and_bmc() {
        let tree = ComponentTree::new(vec![ComponentTreeBranch::new(Branch::Bmc)]).unwrap();
        assert!(matches!(
            build_session_component_tree(&tree),
            Err(TreeError::BranchNotFound(Branch::Cmc))
        ));
    }

    #[test]
    fn ingest_bmc_on_base_tree() {
        let mut base = build_base_component_tree();
        ingest_bmc_component_tree(
            &mut base,
            &payload(json!({
                "root": {"type": "root", "content": {}},
                "page": {"type": "page", "parentId": "root"}
            })),
        )
        .unwrap();
        assert!(base.branch(Branch::Bmc).unwrap().contains("page"));
        assert!(base.is_updated());
    }

    #[test]
    fn ingest_bmc_refused_on_session_tree() {
        let base = build_base_component_tree();
        let mut session = build_session_component_tree(&base).unwrap();
        let err = ingest_bmc_component_tree(&mut session, &payload(json!({}))).unwrap_err();
        assert!(matches!(err, TreeError::Frozen(Branch::Bmc)));
        assert!(!session.is_updated());
    }

    #[test]
    fn ingest_bmc_needs_bmc_branch() {
        let mut tree =
            ComponentTree::new(vec![ComponentTreeBranch::new(Branch::Session)]).unwrap();
        let err = ingest_bmc_component_tree(&mut tree, &payload(json!({}))).unwrap_err();
        assert!(matches!(err, TreeError::BranchNotFound(Branch::Bmc)));
    }

    #[test]
    fn cmc_list() {
        let mut base = build_base_component_tree();
        base.attach(Component::new("a", "text"), None).unwrap();
        let list = cmc_components_list(&base).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "a");
        assert!(session_components_list(&base).is_err());
    }
}
