//! Tree context — which component tree the current code is working on.
//!
//! Two scopes bind a tree:
//! - `use_component_tree` for a synchronous block (thread-local slot)
//! - `scope_component_tree` for an async task (tokio task-local)
//!
//! Lookup order is innermost synchronous binding, then the task binding, then
//! the process-wide base tree. Bindings are restored on scope exit, panics
//! included.

use std::cell::RefCell;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::component::{Component, POSITIONLESS};
use super::error::TreeResult;
use super::factory::build_base_component_tree;
use super::ComponentTree;

/// A component tree shared between the session layer and the code driving it.
pub type SharedComponentTree = Arc<Mutex<ComponentTree>>;

static BASE_TREE: OnceLock<SharedComponentTree> = OnceLock::new();

thread_local! {
    static CURRENT_TREE: RefCell<Option<SharedComponentTree>> = const { RefCell::new(None) };
    static PARENT_CONTAINERS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static TASK_TREE: SharedComponentTree;
}

/// Wrap a tree for sharing.
pub fn shared(tree: ComponentTree) -> SharedComponentTree {
    Arc::new(Mutex::new(tree))
}

/// Lock a shared tree. A poisoned lock is recovered: tree operations either
/// complete or fail before mutating.
pub fn lock_tree(tree: &SharedComponentTree) -> MutexGuard<'_, ComponentTree> {
    tree.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The process-wide base tree, built on first use.
pub fn base_component_tree() -> SharedComponentTree {
    Arc::clone(BASE_TREE.get_or_init(|| shared(build_base_component_tree())))
}

/// Restores the previous thread-local binding on drop.
struct TreeBinding {
    previous: Option<SharedComponentTree>,
}

impl Drop for TreeBinding {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_TREE.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Run `f` with `tree` as the current tree.
pub fn use_component_tree<R>(tree: SharedComponentTree, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_TREE.with(|slot| slot.borrow_mut().replace(tree));
    let _binding = TreeBinding { previous };
    f()
}

/// Run `fut` with `tree` as the current tree for the whole task scope,
/// across every suspension point.
pub async fn scope_component_tree<F: Future>(tree: SharedComponentTree, fut: F) -> F::Output {
    TASK_TREE.scope(tree, fut).await
}

/// The tree bound by the innermost scope, or the base tree.
pub fn current_component_tree() -> SharedComponentTree {
    if let Some(tree) = CURRENT_TREE.with(|slot| slot.borrow().clone()) {
        return tree;
    }
    if let Ok(tree) = TASK_TREE.try_with(Arc::clone) {
        return tree;
    }
    base_component_tree()
}

struct ParentBinding;

impl Drop for ParentBinding {
    fn drop(&mut self) {
        PARENT_CONTAINERS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f` with `parent_id` as the container new components are placed in.
pub fn use_parent_container<R>(parent_id: impl Into<String>, f: impl FnOnce() -> R) -> R {
    PARENT_CONTAINERS.with(|stack| stack.borrow_mut().push(parent_id.into()));
    let _binding = ParentBinding;
    f()
}

pub fn current_parent_container() -> Option<String> {
    PARENT_CONTAINERS.with(|stack| stack.borrow().last().cloned())
}

/// Attach a code-managed component to the current tree, under the current
/// parent container when one is bound. Returns the component id.
///
/// Locks the current tree; do not call while holding that lock.
pub fn attach_to_current_parent(
    mut component: Component,
    is_positionless: bool,
) -> TreeResult<String> {
    if let Some(parent_id) = current_parent_container() {
        component.parent_id = Some(parent_id);
    }

    let shared_tree = current_component_tree();
    let mut tree = lock_tree(&shared_tree);

    component.position = match component.parent_id {
        Some(ref parent_id) => tree.determine_position(parent_id, is_positionless),
        None if is_positionless => POSITIONLESS,
        None => component.position,
    };
    component.is_code_managed = true;

    let id = component.id.clone();
    tree.attach(component, None)?;
    Ok(id)
}
