//! Built-in transforms.
//!
//! * `$` - the current datapoint, or one element of it
//! * `last` - whether the datapoint is the final one of the stream
//! * `count`, `sum` - stream aggregates emitted at end of stream
//! * `filter` - keeps datapoints matching a predicate
//! * `lt`, `lte`, `gt`, `gte`, `eq`, `ne` - comparisons
//! * `ifelse` - routes each datapoint through one of two pipelines

pub mod aggregate;
pub mod compare;
pub mod filter;
pub mod identity;
pub mod ifelse;
pub mod last;

use crate::error::PipelineResult;
use crate::transform::TransformRegistry;

/// Registers every built-in transform.
pub fn register_builtins(registry: &mut TransformRegistry) -> PipelineResult<()> {
    registry.register(identity::descriptor())?;
    registry.register(last::descriptor())?;
    registry.register(aggregate::count_descriptor())?;
    registry.register(aggregate::sum_descriptor())?;
    registry.register(filter::descriptor())?;
    for descriptor in compare::descriptors() {
        registry.register(descriptor)?;
    }
    registry.register(ifelse::descriptor())?;
    Ok(())
}
