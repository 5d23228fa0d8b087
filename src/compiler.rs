//! Compiles parsed pipeline trees into [`Script`]s.
//!
//! A pipeline tree is what a parser produces from pipeline text: transform
//! names with argument sub-trees, literal constants, and pipes. Trees are plain
//! serde data so they can be written by hand or produced by another process.

use crate::datapoint::Value;
use crate::error::{PipelineError, PipelineResult};
use crate::script::Script;
use crate::transform::TransformRegistry;
use log::debug;
use serde::{Deserialize, Serialize};

/// A parsed pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineTree {
    /// Stages run left to right, each reading the previous one's output
    Pipe { pipe: Vec<PipelineTree> },
    /// A registered transform applied to argument sub-pipelines
    Transform {
        transform: String,
        #[serde(default)]
        args: Vec<PipelineTree>,
    },
    /// A literal value
    Constant { constant: Value },
}

impl PipelineTree {
    pub fn transform(name: impl Into<String>, args: Vec<PipelineTree>) -> Self {
        PipelineTree::Transform {
            transform: name.into(),
            args,
        }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        PipelineTree::Constant {
            constant: value.into(),
        }
    }

    pub fn pipe(stages: Vec<PipelineTree>) -> Self {
        PipelineTree::Pipe { pipe: stages }
    }

    /// Parses a tree from its JSON form.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Turns [`PipelineTree`]s into scripts using a registry.
pub struct Compiler<'a> {
    registry: &'a TransformRegistry,
    fold_constants: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a TransformRegistry) -> Self {
        Self {
            registry,
            fold_constants: true,
        }
    }

    /// Whether constant sub-pipelines are evaluated once at compile time.
    pub fn fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    /// Compiles the whole tree. Any failure aborts compilation of the tree.
    pub fn compile(&self, tree: &PipelineTree) -> PipelineResult<Script> {
        let script = self.compile_node(tree)?;
        debug!(
            "Compiled pipeline (one-to-one: {}, constant: {}, peeking: {})",
            script.is_one_to_one(),
            script.is_constant(),
            script.is_peeking()
        );
        Ok(script)
    }

    fn compile_node(&self, tree: &PipelineTree) -> PipelineResult<Script> {
        let script = match tree {
            PipelineTree::Constant { constant } => return Ok(Script::constant(constant.clone())),
            PipelineTree::Transform { transform, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.compile_node(arg))
                    .collect::<PipelineResult<Vec<_>>>()?;
                self.registry.compile(transform, args)?
            }
            PipelineTree::Pipe { pipe } => {
                let mut stages = pipe.iter();
                let first = stages
                    .next()
                    .ok_or_else(|| PipelineError::compile("pipe", "a pipe needs at least one stage"))?;
                let mut script = self.compile_node(first)?;
                for stage in stages {
                    script = script.pipe(self.compile_node(stage)?);
                }
                script
            }
        };

        if self.fold_constants {
            script.fold_constant()
        } else {
            Ok(script)
        }
    }
}
