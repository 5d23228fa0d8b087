//! # Transform System
//!
//! Named, registered pipeline operations and the contract for turning them
//! into runtime nodes.
//!
//! ## Components
//!
//! * `descriptor` - [`Transform`] descriptors, argument slots and [`Transform::compile`]
//! * `registry` - the [`TransformRegistry`] name table
//! * `instance` - the [`TransformInstance`] trait and the per-call [`TransformIterator`]
//!
//! ## Compilation
//!
//! A parser hands over a tree of transform names with argument sub-trees. Each
//! node is looked up in the registry and compiled: arguments are checked
//! against the declared slots, defaults are filled in, and the transform's
//! generator builds the [`TransformInstance`] that becomes a [`Script`](crate::script::Script).

pub mod descriptor;
pub mod instance;
pub mod registry;

pub use descriptor::{GeneratedTransform, Transform, TransformArg, TransformGenerator};
pub use instance::{TransformEnvironment, TransformInstance, TransformIterator};
pub use registry::TransformRegistry;
