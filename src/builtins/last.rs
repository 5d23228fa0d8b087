//! The `last` transform.

use crate::datapoint::Datapoint;
use crate::error::PipelineResult;
use crate::script::Script;
use crate::transform::{GeneratedTransform, Transform, TransformInstance, TransformIterator};

#[derive(Clone)]
struct Last;

impl TransformInstance for Last {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        let env = iter.next();
        if env.is_finished() {
            return env.get();
        }
        let is_last = iter.peek(0).is_finished();
        env.set(is_last)
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(Last)
    }
}

fn generate(_name: &str, args: Vec<Script>) -> PipelineResult<GeneratedTransform> {
    Ok(GeneratedTransform::new(Box::new(Last), args))
}

pub fn descriptor() -> Transform {
    Transform::new("last", "Returns true if the datapoint is the last one in the stream")
        .one_to_one(true)
        .peek(true)
        .generator(generate)
}
