//! Name to descriptor table consulted by the compiler.

use super::descriptor::Transform;
use crate::error::{PipelineError, PipelineResult};
use crate::script::Script;
use log::debug;
use std::collections::HashMap;

/// Registered transforms by name. A name can be registered once.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl TransformRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in transforms.
    pub fn with_builtins() -> PipelineResult<Self> {
        let mut registry = Self::new();
        crate::builtins::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// Adds a transform.
    ///
    /// Rejects empty names, descriptors without a generator, names that are
    /// already registered, and required arguments declared after an optional
    /// one.
    pub fn register(&mut self, transform: Transform) -> PipelineResult<()> {
        if transform.name.is_empty() {
            return Err(PipelineError::registration("transform name is empty"));
        }
        if transform.generator.is_none() {
            return Err(PipelineError::registration(format!(
                "transform '{}' has no generator",
                transform.name
            )));
        }
        if self.transforms.contains_key(&transform.name) {
            return Err(PipelineError::registration(format!(
                "transform '{}' is already registered",
                transform.name
            )));
        }
        if let Some(first_optional) = transform.args.iter().position(|arg| arg.optional) {
            if let Some(offset) = transform.args[first_optional..]
                .iter()
                .position(|arg| !arg.optional)
            {
                return Err(PipelineError::registration(format!(
                    "transform '{}': required argument {} follows an optional argument",
                    transform.name,
                    first_optional + offset + 1
                )));
            }
        }

        debug!(
            "Registered transform '{}' ({} arguments)",
            transform.name,
            transform.args.len()
        );
        self.transforms.insert(transform.name.clone(), transform);
        Ok(())
    }

    /// Returns the named transform or a `NotFoundError`.
    pub fn lookup(&self, name: &str) -> PipelineResult<&Transform> {
        self.transforms
            .get(name)
            .ok_or_else(|| PipelineError::not_found(name))
    }

    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.transforms.values()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Looks up `name` and compiles it with `args`.
    pub fn compile(&self, name: &str, args: Vec<Script>) -> PipelineResult<Script> {
        self.lookup(name)?.compile(args)
    }
}
