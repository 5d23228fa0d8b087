//! Compiled pipelines.
//!
//! A [`Script`] is a chain of pipeline elements. Each element pairs a
//! [`TransformInstance`] with the [`TransformIterator`] over its input, and the
//! input of every element except the first is the element before it. Pulling
//! the script pulls its last element, which recursively pulls everything
//! upstream.

use crate::datapoint::{Datapoint, Value};
use crate::error::{PipelineError, PipelineResult};
use crate::iterator::{DatapointArrayIterator, DatapointIterator, PeekIterator};
use crate::transform::{TransformInstance, TransformIterator};
use std::fmt;
use std::rc::Rc;

/// Where a pipeline element reads its primary input from.
pub(crate) enum ElementInput {
    Unset,
    Source(Box<dyn DatapointIterator>),
    Upstream(Box<PipelineElement>),
}

impl DatapointIterator for ElementInput {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        match self {
            ElementInput::Unset => Err(PipelineError::iterator("script input not set")),
            ElementInput::Source(source) => source.next(),
            ElementInput::Upstream(element) => element.next(),
        }
    }
}

/// One transform occurrence together with its input cursor.
pub(crate) struct PipelineElement {
    transform: Box<dyn TransformInstance>,
    iter: TransformIterator,
}

impl PipelineElement {
    fn new(transform: Box<dyn TransformInstance>, args: Vec<Script>, input: ElementInput) -> Self {
        Self {
            transform,
            iter: TransformIterator::new(PeekIterator::shared(input), args),
        }
    }

    /// Replaces the input of the first element in the chain and drops every
    /// buffered datapoint on the way back down, argument scripts included.
    fn attach(&mut self, input: ElementInput) {
        {
            let shared = Rc::clone(self.iter.input());
            let mut peek = shared.borrow_mut();
            match peek.source_mut() {
                ElementInput::Upstream(upstream) => upstream.attach(input),
                root => *root = input,
            }
        }
        self.iter.reset();
        self.transform.input_reset();
    }

    fn args_peek(&self) -> bool {
        self.iter.args_peek()
    }
}

impl DatapointIterator for PipelineElement {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        self.transform.next(&mut self.iter)
    }
}

// Fresh instance state, fresh argument scripts and cursors. The first element's
// source is left unset.
impl Clone for PipelineElement {
    fn clone(&self) -> Self {
        let input = match self.iter.input().borrow().source() {
            ElementInput::Upstream(upstream) => ElementInput::Upstream(upstream.clone()),
            ElementInput::Source(_) | ElementInput::Unset => ElementInput::Unset,
        };
        Self::new(self.transform.clone_instance(), self.iter.clone_args(), input)
    }
}

/// Emits the same value at every input timestamp.
#[derive(Clone)]
struct ConstantInstance {
    value: Value,
}

impl TransformInstance for ConstantInstance {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        iter.next().set(self.value.clone())
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct PassThrough;

impl TransformInstance for PassThrough {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        iter.next().get()
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(PassThrough)
    }
}

/// A compiled pipeline.
///
/// Scripts are produced by [`Transform::compile`](crate::transform::Transform::compile)
/// and chained with [`pipe`](Self::pipe). A script reads from the iterator given
/// to [`set_input`](Self::set_input); until one is set, `next()` fails.
///
/// Cloning yields an independent pipeline with the same configuration and its
/// own state. The clone has no input.
pub struct Script {
    output: PipelineElement,
    one_to_one: bool,
    constant: bool,
    peeking: bool,
}

impl Script {
    /// Wraps a transform instance and its bound per-datapoint arguments.
    pub fn from_instance(
        instance: Box<dyn TransformInstance>,
        args: Vec<Script>,
        one_to_one: bool,
        constant: bool,
        peek: bool,
    ) -> Self {
        let output = PipelineElement::new(instance, args, ElementInput::Unset);
        let peeking = peek || output.args_peek();
        Self {
            output,
            one_to_one,
            constant: constant && one_to_one && !peeking,
            peeking,
        }
    }

    /// A one-to-one script that outputs `value` with each input timestamp.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::from_instance(
            Box::new(ConstantInstance {
                value: value.into(),
            }),
            Vec::new(),
            true,
            true,
            false,
        )
    }

    /// A one-to-one script that returns its input unchanged.
    pub fn identity() -> Self {
        Self::from_instance(Box::new(PassThrough), Vec::new(), true, false, false)
    }

    /// Sets the iterator this script reads from, replacing any previous input.
    ///
    /// Buffered look-ahead is discarded. Transform state is kept; clone the
    /// script to start over from scratch.
    pub fn set_input(&mut self, input: Box<dyn DatapointIterator>) {
        self.output.attach(ElementInput::Source(input));
    }

    /// Chains `next` after this script, so that `next` reads this script's output.
    pub fn pipe(self, mut next: Script) -> Script {
        let one_to_one = self.one_to_one && next.one_to_one;
        let peeking = self.peeking || next.peeking;
        // The upstream stage decides how many datapoints reach `next` and when.
        let constant = one_to_one && !peeking && (next.constant || self.constant);

        next.output
            .attach(ElementInput::Upstream(Box::new(self.output)));
        Script {
            output: next.output,
            one_to_one,
            constant,
            peeking,
        }
    }

    /// Produces exactly one output datapoint per input datapoint.
    pub fn is_one_to_one(&self) -> bool {
        self.one_to_one
    }

    /// One-to-one, non-peeking, and the output does not depend on the values
    /// of the input.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Somewhere in this pipeline a transform looks ahead in its input.
    pub fn is_peeking(&self) -> bool {
        self.peeking
    }

    /// Evaluates a constant script once, on a placeholder datapoint.
    ///
    /// Works on a clone, so this script is left untouched.
    pub fn get_constant(&self) -> PipelineResult<Value> {
        if !self.constant {
            return Err(PipelineError::iterator(
                "cannot evaluate a non-constant script without input",
            ));
        }
        let mut script = self.clone();
        script.set_input(Box::new(DatapointArrayIterator::new(vec![Datapoint::new(
            0.0,
            Value::Null,
        )])));
        match script.next()? {
            Some(dp) => Ok(dp.data),
            None => Err(PipelineError::iterator(
                "constant script produced no value",
            )),
        }
    }

    /// Replaces a constant script with a precomputed [`Script::constant`].
    /// Other scripts, including any that drop, add or look ahead at
    /// datapoints, are returned unchanged.
    pub fn fold_constant(self) -> PipelineResult<Script> {
        if !self.constant || !self.one_to_one || self.peeking {
            return Ok(self);
        }
        Ok(Script::constant(self.get_constant()?))
    }
}

impl DatapointIterator for Script {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        self.output.next()
    }
}

impl Clone for Script {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            one_to_one: self.one_to_one,
            constant: self.constant,
            peeking: self.peeking,
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("one_to_one", &self.one_to_one)
            .field("constant", &self.constant)
            .field("peeking", &self.peeking)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::compile;
    use crate::iterator::collect_datapoints;
    use crate::iterator::testing::points;

    fn input(values: &[(f64, i64)]) -> Box<dyn DatapointIterator> {
        Box::new(DatapointArrayIterator::new(points(values)))
    }

    #[test]
    fn test_unset_input_fails() {
        let mut script = Script::identity();
        assert_eq!(
            script.next().unwrap_err(),
            PipelineError::iterator("script input not set")
        );
    }

    #[test]
    fn test_constant_keeps_input_timestamps() {
        let mut script = Script::constant("on");
        script.set_input(input(&[(1.0, 7), (2.5, 8)]));

        let out = collect_datapoints(&mut script).unwrap();
        assert_eq!(
            out,
            vec![Datapoint::new(1.0, "on"), Datapoint::new(2.5, "on")]
        );
        assert!(script.is_constant());
        assert!(script.is_one_to_one());
        assert_eq!(script.get_constant().unwrap(), Value::from("on"));
    }

    #[test]
    fn test_pipe_flags() {
        let piped = Script::constant(3).pipe(Script::identity());
        assert!(piped.is_constant());
        assert!(piped.is_one_to_one());
        assert!(!piped.is_peeking());

        let piped = Script::identity().pipe(Script::identity());
        assert!(!piped.is_constant());

        let piped = Script::identity().pipe(Script::constant(1));
        assert!(piped.is_constant());
    }

    #[test]
    fn test_pipe_is_constant_only_when_shape_is_preserved() {
        let counted = compile("count", vec![]).unwrap().pipe(Script::constant(5));
        assert!(!counted.is_one_to_one());
        assert!(!counted.is_constant());

        let filtered = compile("filter", vec![Script::constant(true)])
            .unwrap()
            .pipe(Script::constant(5));
        assert!(!filtered.is_constant());

        let looked_ahead = Script::constant(5).pipe(compile("last", vec![]).unwrap());
        assert!(looked_ahead.is_peeking());
        assert!(!looked_ahead.is_constant());

        let kept = looked_ahead.fold_constant().unwrap();
        assert!(kept.is_peeking());
        assert!(kept.get_constant().is_err());
    }

    #[test]
    fn test_piped_scripts_pull_through() {
        let mut piped = Script::identity()
            .pipe(Script::identity())
            .pipe(Script::identity());
        piped.set_input(input(&[(1.0, 1), (2.0, 2)]));
        assert_eq!(
            collect_datapoints(&mut piped).unwrap(),
            points(&[(1.0, 1), (2.0, 2)])
        );

        // rebinding reaches the first element of the chain
        piped.set_input(input(&[(5.0, 5)]));
        assert_eq!(collect_datapoints(&mut piped).unwrap(), points(&[(5.0, 5)]));
    }

    #[test]
    fn test_clone_has_no_input() {
        let mut script = Script::identity().pipe(Script::identity());
        script.set_input(input(&[(1.0, 1)]));

        let mut copy = script.clone();
        assert!(copy.next().is_err());
        assert_eq!(script.next().unwrap(), Some(Datapoint::new(1.0, 1)));
    }

    #[test]
    fn test_fold_constant() {
        let folded = Script::constant(4).pipe(Script::identity()).fold_constant().unwrap();
        assert!(folded.is_constant());
        assert_eq!(folded.get_constant().unwrap(), Value::Number(4.0));

        let kept = Script::identity().fold_constant().unwrap();
        assert!(!kept.is_constant());
        assert!(kept.get_constant().is_err());
    }
}
