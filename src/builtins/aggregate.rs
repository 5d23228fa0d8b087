//! `count` and `sum`: whole-stream aggregates.
//!
//! Both consume their entire input and emit a single datapoint carrying the
//! timestamp of the final input datapoint. An empty stream produces nothing.

use crate::datapoint::{Datapoint, Value};
use crate::error::{PipelineError, PipelineResult};
use crate::script::Script;
use crate::transform::{GeneratedTransform, Transform, TransformInstance, TransformIterator};

#[derive(Debug, Clone, Copy, PartialEq)]
enum AggregateKind {
    Count,
    Sum,
}

#[derive(Clone)]
struct Aggregate {
    kind: AggregateKind,
    count: i64,
    total: f64,
    last_timestamp: Option<f64>,
}

impl Aggregate {
    fn new(kind: AggregateKind) -> Self {
        Self {
            kind,
            count: 0,
            total: 0.0,
            last_timestamp: None,
        }
    }

    fn result(&self) -> Value {
        match self.kind {
            AggregateKind::Count => Value::from(self.count),
            AggregateKind::Sum => Value::from(self.total),
        }
    }
}

impl TransformInstance for Aggregate {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        loop {
            let env = iter.next();
            if let Some(err) = env.error {
                return Err(err);
            }
            let Some(dp) = env.datapoint else {
                break;
            };
            if self.kind == AggregateKind::Sum {
                self.total += dp.data.as_f64()?;
            }
            self.count += 1;
            self.last_timestamp = Some(dp.timestamp);
        }

        let Some(timestamp) = self.last_timestamp.take() else {
            return Ok(None);
        };
        let value = self.result();
        self.count = 0;
        self.total = 0.0;
        Ok(Some(Datapoint::new(timestamp, value)))
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(Aggregate::new(self.kind))
    }
}

fn generate(name: &str, args: Vec<Script>) -> PipelineResult<GeneratedTransform> {
    let kind = match name {
        "count" => AggregateKind::Count,
        "sum" => AggregateKind::Sum,
        other => return Err(PipelineError::compile(other, "not a known aggregate")),
    };
    Ok(GeneratedTransform::new(Box::new(Aggregate::new(kind)), args))
}

pub fn count_descriptor() -> Transform {
    Transform::new("count", "Counts the datapoints in the stream").generator(generate)
}

pub fn sum_descriptor() -> Transform {
    Transform::new("sum", "Adds up the numeric values of the stream").generator(generate)
}
