//! Runs compiled pipelines over datapoint files.
//!
//! Input files hold datapoints as `{"t": <timestamp>, "d": <data>}` objects,
//! either in one JSON array or one per line. Multiple inputs are merged by
//! timestamp before they reach the pipeline.

use crate::compiler::{Compiler, PipelineTree};
use crate::config::{EngineConfig, OutputConfig, OutputFormat};
use crate::datapoint::Datapoint;
use crate::error::{PipelineError, PipelineResult};
use crate::iterator::{DatapointArrayIterator, DatapointIterator, MergeIterator, OrderedIterator};
use crate::script::Script;
use crate::transform::TransformRegistry;
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A named input stream.
pub type Source = (String, Box<dyn DatapointIterator>);

/// Reads a JSON array or JSON-lines datapoint file.
pub fn read_datapoints(path: &Path) -> PipelineResult<Vec<Datapoint>> {
    let content = fs::read_to_string(path)
        .map_err(|e| PipelineError::io(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_datapoints(&content)
}

/// Parses datapoints from a JSON array or from JSON lines.
pub fn parse_datapoints(content: &str) -> PipelineResult<Vec<Datapoint>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| PipelineError::io(format!("line {}: {}", index + 1, e)))
        })
        .collect()
}

/// Streams datapoints to a writer as they are produced.
pub struct DatapointWriter<W: Write> {
    out: W,
    format: OutputFormat,
    pretty: bool,
    written: usize,
}

impl<W: Write> DatapointWriter<W> {
    pub fn new(out: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            out,
            format,
            pretty,
            written: 0,
        }
    }

    pub fn from_config(out: W, config: &OutputConfig) -> Self {
        Self::new(out, config.format, config.pretty)
    }

    pub fn write(&mut self, dp: &Datapoint) -> PipelineResult<()> {
        match self.format {
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.out, dp)?;
                writeln!(self.out)?;
            }
            OutputFormat::Json => {
                let separator = if self.written == 0 { "[" } else { "," };
                write!(self.out, "{}", separator)?;
                if self.pretty {
                    write!(self.out, "\n  ")?;
                    serde_json::to_writer_pretty(&mut self.out, dp)?;
                } else {
                    serde_json::to_writer(&mut self.out, dp)?;
                }
            }
        }
        self.written += 1;
        Ok(())
    }

    /// Number of datapoints written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Closes the output and returns the underlying writer.
    pub fn finish(mut self) -> PipelineResult<W> {
        if self.format == OutputFormat::Json {
            match (self.written, self.pretty) {
                (0, _) => writeln!(self.out, "[]")?,
                (_, true) => writeln!(self.out, "\n]")?,
                (_, false) => writeln!(self.out, "]")?,
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Compiles pipeline trees and drives them over input sources.
pub struct Runner<'a> {
    registry: &'a TransformRegistry,
    config: EngineConfig,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a TransformRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compile(&self, tree: &PipelineTree) -> PipelineResult<Script> {
        Compiler::new(self.registry)
            .fold_constants(self.config.execution.fold_constants)
            .compile(tree)
    }

    /// Merges `sources` into the script's input and writes every output
    /// datapoint. Returns the number of datapoints written.
    pub fn execute<W: Write>(
        &self,
        script: &mut Script,
        sources: Vec<Source>,
        writer: &mut DatapointWriter<W>,
    ) -> PipelineResult<usize> {
        let max_sources = self.config.execution.max_sources;
        if sources.len() > max_sources {
            return Err(PipelineError::configuration(format!(
                "{} input sources exceed the limit of {}",
                sources.len(),
                max_sources
            )));
        }

        let source_count = sources.len();
        let inputs: Vec<Box<dyn DatapointIterator>> = sources
            .into_iter()
            .map(|(name, iter)| -> Box<dyn DatapointIterator> {
                if self.config.execution.validate_order {
                    Box::new(OrderedIterator::new(iter, name))
                } else {
                    iter
                }
            })
            .collect();
        script.set_input(Box::new(MergeIterator::new(inputs)?));
        debug!("Executing pipeline over {} sources", source_count);

        let mut count = 0;
        while let Some(dp) = script.next()? {
            writer.write(&dp)?;
            count += 1;
        }
        info!("Pipeline produced {} datapoints", count);
        Ok(count)
    }

    /// Compiles `tree`, runs it over the given datapoint files and writes the
    /// output to `out`.
    pub fn run_files<W: Write>(
        &self,
        tree: &PipelineTree,
        inputs: &[PathBuf],
        out: W,
    ) -> PipelineResult<W> {
        let mut script = self.compile(tree)?;

        let mut sources: Vec<Source> = Vec::with_capacity(inputs.len());
        for path in inputs {
            let datapoints = read_datapoints(path)?;
            debug!("Read {} datapoints from {}", datapoints.len(), path.display());
            sources.push((
                path.display().to_string(),
                Box::new(DatapointArrayIterator::new(datapoints)),
            ));
        }

        let mut writer = DatapointWriter::from_config(out, &self.config.output);
        self.execute(&mut script, sources, &mut writer)?;
        writer.finish()
    }
}
