//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use streamscript::{
    collect_datapoints, Compiler, Datapoint, DatapointArrayIterator, PipelineResult,
    PipelineTree, Script, TransformRegistry,
};
use tempfile::TempDir;

pub fn registry() -> TransformRegistry {
    TransformRegistry::with_builtins().expect("builtins register")
}

/// Datapoints with integer data at the given timestamps.
pub fn series(values: &[(f64, i64)]) -> Vec<Datapoint> {
    values
        .iter()
        .map(|&(t, d)| Datapoint::new(t, d))
        .collect()
}

pub fn compile(registry: &TransformRegistry, json: &str) -> PipelineResult<Script> {
    let tree = PipelineTree::from_json(json)?;
    Compiler::new(registry).compile(&tree)
}

/// Feeds `input` through `script` and collects everything it produces.
pub fn run(script: &mut Script, input: Vec<Datapoint>) -> PipelineResult<Vec<Datapoint>> {
    script.set_input(Box::new(DatapointArrayIterator::new(input)));
    collect_datapoints(script)
}

/// Temporary directory holding datapoint and config files for one test.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create fixture file");
        file.write_all(content.as_bytes()).expect("write fixture file");
        path
    }
}
