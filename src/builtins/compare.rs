//! Comparison transforms: `lt`, `lte`, `gt`, `gte`, `eq` and `ne`.
//!
//! Ordering comparisons coerce both operands to numbers. Equality compares
//! values structurally, so `1` and `"1"` are not equal.

use crate::datapoint::{Datapoint, Value};
use crate::error::{PipelineError, PipelineResult};
use crate::script::Script;
use crate::transform::{
    GeneratedTransform, Transform, TransformArg, TransformInstance, TransformIterator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "lt" => Some(Comparison::LessThan),
            "lte" => Some(Comparison::LessThanOrEqual),
            "gt" => Some(Comparison::GreaterThan),
            "gte" => Some(Comparison::GreaterThanOrEqual),
            "eq" => Some(Comparison::Equal),
            "ne" => Some(Comparison::NotEqual),
            _ => None,
        }
    }

    fn apply(self, left: &Value, right: &Value) -> PipelineResult<bool> {
        let result = match self {
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
            Comparison::LessThan => left.as_f64()? < right.as_f64()?,
            Comparison::LessThanOrEqual => left.as_f64()? <= right.as_f64()?,
            Comparison::GreaterThan => left.as_f64()? > right.as_f64()?,
            Comparison::GreaterThanOrEqual => left.as_f64()? >= right.as_f64()?,
        };
        Ok(result)
    }
}

#[derive(Clone)]
struct Compare {
    comparison: Comparison,
}

impl TransformInstance for Compare {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        let env = iter.next();
        if env.is_finished() {
            return env.get();
        }
        let result = self.comparison.apply(env.arg(0)?, env.arg(1)?)?;
        env.set(result)
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(self.clone())
    }
}

fn generate(name: &str, args: Vec<Script>) -> PipelineResult<GeneratedTransform> {
    let comparison = Comparison::from_name(name)
        .ok_or_else(|| PipelineError::compile(name, "not a known comparison"))?;
    let constant = args.iter().all(Script::is_constant);
    Ok(GeneratedTransform::new(Box::new(Compare { comparison }), args).constant(constant))
}

fn comparison(name: &str, description: &str) -> Transform {
    Transform::new(name, description)
        .arg(TransformArg::required("Left operand"))
        .arg(TransformArg::required("Right operand"))
        .one_to_one(true)
        .generator(generate)
}

/// Descriptors for every comparison transform.
pub fn descriptors() -> Vec<Transform> {
    vec![
        comparison("lt", "Returns true if the left operand is less than the right"),
        comparison(
            "lte",
            "Returns true if the left operand is less than or equal to the right",
        ),
        comparison("gt", "Returns true if the left operand is greater than the right"),
        comparison(
            "gte",
            "Returns true if the left operand is greater than or equal to the right",
        ),
        comparison("eq", "Returns true if both operands are equal"),
        comparison("ne", "Returns true if the operands differ"),
    ]
}
