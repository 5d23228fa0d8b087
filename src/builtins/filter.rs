//! The `filter` transform.

use crate::datapoint::Datapoint;
use crate::error::PipelineResult;
use crate::script::Script;
use crate::transform::{
    GeneratedTransform, Transform, TransformArg, TransformInstance, TransformIterator,
};

#[derive(Clone)]
struct Filter;

impl TransformInstance for Filter {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        loop {
            let env = iter.next();
            if env.is_finished() || env.arg_bool(0)? {
                return env.get();
            }
        }
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(Filter)
    }
}

fn generate(_name: &str, args: Vec<Script>) -> PipelineResult<GeneratedTransform> {
    Ok(GeneratedTransform::new(Box::new(Filter), args))
}

pub fn descriptor() -> Transform {
    Transform::new(
        "filter",
        "Keeps only the datapoints for which the predicate is true",
    )
    .arg(TransformArg::required("Predicate evaluated for each datapoint"))
    .generator(generate)
}
