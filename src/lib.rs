//! buildstate — component tree and state serialisation for an app builder.
//!
//! - [`tree`]: layered component trees (builder, code and session branches),
//!   their factories, and the context that binds a tree to running code.
//! - [`serdes`]: the type-driven registry that turns application state into
//!   wire-safe values.

pub mod serdes;
pub mod tree;

pub use buildstate_config::{IngestMode, StateConfig};
pub use serdes::{
    register_serdes, reset_serdes, serialise, Serdes, SerdesError, SerdesRegistry, StateValue,
    TypeMatcher,
};
pub use tree::{Branch, Component, ComponentTree, ComponentTreeBranch, TreeError};
