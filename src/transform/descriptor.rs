//! Transform descriptors and argument binding.

use super::instance::TransformInstance;
use crate::datapoint::Value;
use crate::error::{PipelineError, PipelineResult};
use crate::script::Script;
use log::debug;
use serde::Serialize;
use std::fmt;

/// One declared argument slot of a transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformArg {
    /// Human readable description of the argument
    pub description: String,
    /// Whether the argument may be omitted
    pub optional: bool,
    /// Value substituted when an optional argument is omitted
    pub default: Value,
    /// Whether the argument must be a constant script
    pub constant: bool,
    /// Whether the bound script is handed to the generator unevaluated
    pub hijacked: bool,
}

impl TransformArg {
    pub fn required(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            optional: false,
            default: Value::Null,
            constant: false,
            hijacked: false,
        }
    }

    pub fn optional(description: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            optional: true,
            default: default.into(),
            ..Self::required(description)
        }
    }

    /// Requires the bound script to be constant.
    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn hijacked(mut self) -> Self {
        self.hijacked = true;
        self
    }
}

/// What a generator hands back to [`Transform::compile`].
pub struct GeneratedTransform {
    pub instance: Box<dyn TransformInstance>,
    /// Arguments evaluated per datapoint and passed to the instance's cursor.
    /// Hijacked scripts that the instance drives itself are not listed here.
    pub args: Vec<Script>,
    /// The output does not depend on the primary input.
    pub constant: bool,
}

impl GeneratedTransform {
    pub fn new(instance: Box<dyn TransformInstance>, args: Vec<Script>) -> Self {
        Self {
            instance,
            args,
            constant: false,
        }
    }

    pub fn constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }
}

/// Builds the runtime instance of a transform from its bound arguments.
///
/// Receives the transform's registered name and one script per declared slot,
/// with defaults already substituted.
pub type TransformGenerator = fn(&str, Vec<Script>) -> PipelineResult<GeneratedTransform>;

/// Registered description of a transform.
#[derive(Clone, Serialize)]
pub struct Transform {
    pub name: String,
    pub description: String,
    pub args: Vec<TransformArg>,
    /// Produces exactly one output datapoint per input datapoint
    pub one_to_one: bool,
    /// Looks ahead in its input
    pub peek: bool,
    #[serde(skip)]
    pub generator: Option<TransformGenerator>,
}

impl Transform {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
            one_to_one: false,
            peek: false,
            generator: None,
        }
    }

    pub fn arg(mut self, arg: TransformArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn one_to_one(mut self, one_to_one: bool) -> Self {
        self.one_to_one = one_to_one;
        self
    }

    pub fn peek(mut self, peek: bool) -> Self {
        self.peek = peek;
        self
    }

    pub fn generator(mut self, generator: TransformGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Binds `args` to the declared slots and builds a script node.
    ///
    /// Fails when more arguments are supplied than declared, when a required
    /// slot is missing, when a constant slot receives a non-constant script, or
    /// when an evaluated slot receives a script that is not one-to-one.
    /// Omitted optional slots receive a constant script of their default.
    pub fn compile(&self, args: Vec<Script>) -> PipelineResult<Script> {
        let generator = self.generator.ok_or_else(|| {
            PipelineError::compile(&self.name, "transform has no generator")
        })?;

        if args.len() > self.args.len() {
            return Err(PipelineError::compile(
                &self.name,
                format!(
                    "too many arguments: expected at most {}, got {}",
                    self.args.len(),
                    args.len()
                ),
            ));
        }

        let mut supplied = args.into_iter();
        let mut bound = Vec::with_capacity(self.args.len());
        for (index, slot) in self.args.iter().enumerate() {
            match supplied.next() {
                Some(script) => {
                    if !slot.hijacked && !script.is_one_to_one() {
                        return Err(PipelineError::compile(
                            &self.name,
                            format!("argument {} must be one-to-one", index + 1),
                        ));
                    }
                    if slot.constant && !script.is_constant() {
                        return Err(PipelineError::compile(
                            &self.name,
                            format!("argument {} must be a constant", index + 1),
                        ));
                    }
                    bound.push(script);
                }
                None if slot.optional => bound.push(Script::constant(slot.default.clone())),
                None => {
                    return Err(PipelineError::compile(
                        &self.name,
                        format!(
                            "missing required argument {} ({})",
                            index + 1,
                            slot.description
                        ),
                    ))
                }
            }
        }

        let generated = generator(&self.name, bound)?;
        debug!(
            "Compiled transform '{}' with {} evaluated arguments (constant: {})",
            self.name,
            generated.args.len(),
            generated.constant
        );

        Ok(Script::from_instance(
            generated.instance,
            generated.args,
            self.one_to_one,
            generated.constant,
            self.peek,
        ))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("one_to_one", &self.one_to_one)
            .field("peek", &self.peek)
            .field("has_generator", &self.generator.is_some())
            .finish()
    }
}
