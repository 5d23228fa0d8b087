//! # StreamScript
//!
//! A streaming transformation engine for time series. Pipelines ("scripts")
//! consume one or more time-ordered streams of timestamped values and lazily
//! produce a transformed stream.
//!
//! ## Core Components
//!
//! * `datapoint` - the [`Datapoint`] and its dynamically typed [`Value`]
//! * `iterator` - pull-based streams with look-ahead, virtual cursors and merging
//! * `transform` - transform descriptors, the registry and the runtime cursor
//! * `script` - compiled pipelines
//! * `builtins` - the built-in transforms
//! * `compiler` - turns parsed pipeline trees into scripts
//! * `schema` - object payload validation
//! * `config` - engine configuration
//! * `runner` - file input and output around a compiled pipeline
//! * `error` - error types and handling
//!
//! ## Architecture
//!
//! Evaluation is single-threaded and pull-based. Pulling a script's output
//! recursively pulls every stage and source upstream of it, so no datapoint is
//! read before it is needed. Look-ahead is available at every stage through
//! buffered peek iterators, and argument sub-pipelines observe the same input
//! through virtual cursors that never consume it.

pub mod builtins;
pub mod compiler;
pub mod config;
pub mod datapoint;
pub mod error;
pub mod iterator;
pub mod runner;
pub mod schema;
pub mod script;
pub mod transform;

pub use compiler::{Compiler, PipelineTree};
pub use config::{ConfigLoader, EngineConfig, LogLevel, OutputFormat};
pub use datapoint::{Datapoint, Value};
pub use error::{ErrorCategory, PipelineError, PipelineResult};
pub use iterator::{
    collect_datapoints, merge, DatapointArrayIterator, DatapointIterator, DatapointPeekIterator,
    InjectionPoint, MergeIterator, OrderedIterator, PeekIterator, VirtualPeekIterator,
};
pub use runner::{read_datapoints, DatapointWriter, Runner};
pub use schema::ObjectSchema;
pub use script::Script;
pub use transform::{
    GeneratedTransform, Transform, TransformArg, TransformEnvironment, TransformInstance,
    TransformIterator, TransformRegistry,
};
