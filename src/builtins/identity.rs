//! The `$` transform.

use crate::datapoint::{Datapoint, Value};
use crate::error::{PipelineError, PipelineResult};
use crate::script::Script;
use crate::transform::{
    GeneratedTransform, Transform, TransformArg, TransformInstance, TransformIterator,
};

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Whole,
    Key(String),
    Index(usize),
}

impl Selector {
    fn from_value(name: &str, value: Value) -> PipelineResult<Self> {
        match value {
            Value::Null => Ok(Selector::Whole),
            Value::String(key) => Ok(Selector::Key(key)),
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Selector::Index(n as usize)),
            other => Err(PipelineError::compile(
                name,
                format!(
                    "selector must be a key or a non-negative integer index, got {}",
                    other
                ),
            )),
        }
    }
}

#[derive(Clone)]
struct Identity {
    selector: Selector,
}

impl TransformInstance for Identity {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        let env = iter.next();
        let Some(data) = env.data() else {
            return env.get();
        };

        // Missing keys and out-of-range indices select null.
        let selected = match &self.selector {
            Selector::Whole => return env.get(),
            Selector::Key(key) => data.get(key)?.cloned().unwrap_or_default(),
            Selector::Index(index) => data.index(*index)?.cloned().unwrap_or_default(),
        };
        env.set(selected)
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(self.clone())
    }
}

fn generate(name: &str, args: Vec<Script>) -> PipelineResult<GeneratedTransform> {
    let selector = match args.first() {
        Some(script) => Selector::from_value(name, script.get_constant()?)?,
        None => Selector::Whole,
    };
    Ok(GeneratedTransform::new(
        Box::new(Identity { selector }),
        Vec::new(),
    ))
}

pub fn descriptor() -> Transform {
    Transform::new(
        "$",
        "The current datapoint, or the element selected by an object key or array index",
    )
    .arg(TransformArg::optional("Object key or array index to select", Value::Null).constant())
    .one_to_one(true)
    .generator(generate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{compile, run};
    use serde_json::json;

    fn record(t: f64, value: serde_json::Value) -> Datapoint {
        Datapoint::new(t, Value::from(value))
    }

    #[test]
    fn test_passes_datapoints_through() {
        let mut script = compile("$", vec![]).unwrap();
        let input = vec![Datapoint::new(1.0, 3), Datapoint::new(2.0, "a")];
        assert_eq!(run(&mut script, input.clone()).unwrap(), input);
        assert!(script.is_one_to_one());
        assert!(!script.is_constant());
    }

    #[test]
    fn test_selects_key_and_index() {
        let mut by_key = compile("$", vec![Script::constant("temp")]).unwrap();
        let out = run(
            &mut by_key,
            vec![
                record(1.0, json!({"temp": 21.5})),
                record(2.0, json!({"humidity": 40})),
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![Datapoint::new(1.0, 21.5), Datapoint::new(2.0, Value::Null)]
        );

        let mut by_index = compile("$", vec![Script::constant(1)]).unwrap();
        let out = run(&mut by_index, vec![record(1.0, json!([4, 5, 6]))]).unwrap();
        assert_eq!(out, vec![Datapoint::new(1.0, 5)]);
    }

    #[test]
    fn test_selecting_from_scalar_is_type_mismatch() {
        let mut script = compile("$", vec![Script::constant("temp")]).unwrap();
        let err = run(&mut script, vec![Datapoint::new(1.0, 3)]).unwrap_err();
        assert_eq!(err, PipelineError::type_mismatch("object", "number"));
    }

    #[test]
    fn test_invalid_selector_fails_compilation() {
        assert!(compile("$", vec![Script::constant(-1)]).is_err());
        assert!(compile("$", vec![Script::constant(true)]).is_err());
        assert!(compile("$", vec![Script::identity()]).is_err());
    }
}
