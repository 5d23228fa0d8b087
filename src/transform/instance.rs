//! Runtime protocol between a compiled pipeline node and its transform.
//!
//! A [`TransformInstance`] is driven through a [`TransformIterator`], the cursor
//! over the node's primary input. Every position the cursor yields is a
//! [`TransformEnvironment`]: the input datapoint plus the values every
//! per-datapoint argument evaluated to at that same position.

use crate::datapoint::{Datapoint, Value};
use crate::error::{PipelineError, PipelineResult};
use crate::iterator::{
    DatapointIterator, DatapointPeekIterator, SharedPeekIterator, VirtualPeekIterator,
};
use crate::script::{ElementInput, Script};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Behaviour of one occurrence of a transform in a pipeline.
pub trait TransformInstance {
    /// Produces the next output datapoint, `Ok(None)` at end of stream.
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>>;

    /// Returns an instance with the same configuration and fresh mutable
    /// state. Nested scripts, buffers and injection points must be newly
    /// allocated, never shared with `self`.
    fn clone_instance(&self) -> Box<dyn TransformInstance>;

    /// Called after the node's input was replaced. Implementations holding
    /// nested scripts must rebind them so nothing buffered from the previous
    /// input survives. Accumulated transform state is kept.
    fn input_reset(&mut self) {}
}

impl Clone for Box<dyn TransformInstance> {
    fn clone(&self) -> Self {
        self.clone_instance()
    }
}

/// The input datapoint at one cursor position, with its evaluated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformEnvironment {
    pub datapoint: Option<Datapoint>,
    pub args: Vec<Datapoint>,
    pub error: Option<PipelineError>,
}

impl TransformEnvironment {
    fn finished() -> Self {
        Self {
            datapoint: None,
            args: Vec::new(),
            error: None,
        }
    }

    fn failed(err: PipelineError) -> Self {
        Self {
            datapoint: None,
            args: Vec::new(),
            error: Some(err),
        }
    }

    /// True at end of stream or after an error.
    pub fn is_finished(&self) -> bool {
        self.datapoint.is_none() || self.error.is_some()
    }

    /// The datapoint unchanged, end of stream, or the error.
    pub fn get(self) -> PipelineResult<Option<Datapoint>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.datapoint),
        }
    }

    /// A datapoint with the input's timestamp and the given data. Passes end of
    /// stream and errors through.
    pub fn set(self, data: impl Into<Value>) -> PipelineResult<Option<Datapoint>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(self.datapoint.map(|dp| Datapoint::new(dp.timestamp, data)))
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.datapoint.as_ref().map(|dp| dp.timestamp)
    }

    pub fn data(&self) -> Option<&Value> {
        self.datapoint.as_ref().map(|dp| &dp.data)
    }

    /// The evaluated value of argument `index`.
    pub fn arg(&self, index: usize) -> PipelineResult<&Value> {
        self.args.get(index).map(|dp| &dp.data).ok_or_else(|| {
            PipelineError::iterator(format!("Argument {} is not available", index + 1))
        })
    }

    pub fn arg_bool(&self, index: usize) -> PipelineResult<bool> {
        self.arg(index)?.as_bool()
    }

    pub fn arg_f64(&self, index: usize) -> PipelineResult<f64> {
        self.arg(index)?.as_f64()
    }

    pub fn arg_i64(&self, index: usize) -> PipelineResult<i64> {
        self.arg(index)?.as_i64()
    }

    pub fn arg_str(&self, index: usize) -> PipelineResult<&str> {
        self.arg(index)?.as_str()
    }
}

/// A per-datapoint argument script and the virtual cursor feeding it.
struct BoundArgument {
    script: Script,
    cursor: Rc<RefCell<VirtualPeekIterator<ElementInput>>>,
}

/// Cursor over a pipeline node's primary input.
///
/// Argument scripts read the same input through virtual cursors, so evaluating
/// them (and peeking ahead) never consumes input. Evaluated positions are kept
/// until the transform commits them with [`next`](Self::next).
pub struct TransformIterator {
    input: SharedPeekIterator<ElementInput>,
    args: Vec<BoundArgument>,
    pending: VecDeque<TransformEnvironment>,
}

impl TransformIterator {
    pub(crate) fn new(input: SharedPeekIterator<ElementInput>, args: Vec<Script>) -> Self {
        let args = args
            .into_iter()
            .map(|mut script| {
                let cursor = Rc::new(RefCell::new(VirtualPeekIterator::new(Rc::clone(&input))));
                script.set_input(Box::new(Rc::clone(&cursor)));
                BoundArgument { script, cursor }
            })
            .collect();

        Self {
            input,
            args,
            pending: VecDeque::new(),
        }
    }

    pub(crate) fn input(&self) -> &SharedPeekIterator<ElementInput> {
        &self.input
    }

    /// Copies of the bound argument scripts with fresh state.
    pub(crate) fn clone_args(&self) -> Vec<Script> {
        self.args.iter().map(|arg| arg.script.clone()).collect()
    }

    pub(crate) fn args_peek(&self) -> bool {
        self.args.iter().any(|arg| arg.script.is_peeking())
    }

    /// Forgets evaluated positions and rebinds every argument script to its
    /// rewound cursor, for a new input.
    pub(crate) fn reset(&mut self) {
        self.pending.clear();
        self.input.borrow_mut().reset();
        for arg in self.args.iter_mut() {
            arg.cursor.borrow_mut().reset();
            arg.script.set_input(Box::new(Rc::clone(&arg.cursor)));
        }
    }

    /// Number of per-datapoint arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Consumes the next input position.
    ///
    /// End of stream and errors are sticky: once returned, every later call
    /// returns them again.
    pub fn next(&mut self) -> TransformEnvironment {
        if self.pending.is_empty() {
            let env = self.evaluate();
            self.pending.push_back(env);
        }

        let terminal = match self.pending.front() {
            Some(env) if env.is_finished() => Some(env.clone()),
            Some(_) => None,
            None => Some(TransformEnvironment::finished()),
        };
        if let Some(env) = terminal {
            return env;
        }

        // The position is buffered in the input, so committing cannot fail.
        let committed = self.input.borrow_mut().next();
        debug_assert!(matches!(committed, Ok(Some(_))));
        for arg in &self.args {
            arg.cursor.borrow_mut().set_back(1);
        }
        self.pending
            .pop_front()
            .unwrap_or_else(TransformEnvironment::finished)
    }

    /// Looks `forward` positions ahead without consuming. `peek(0)` is what
    /// `next()` will return.
    pub fn peek(&mut self, forward: usize) -> TransformEnvironment {
        while self.pending.len() <= forward {
            if let Some(last) = self.pending.back() {
                if last.is_finished() {
                    return last.clone();
                }
            }
            let env = self.evaluate();
            self.pending.push_back(env);
        }
        self.pending[forward].clone()
    }

    /// Whether the input has no further datapoints.
    pub fn is_finished(&mut self) -> bool {
        self.peek(0).is_finished()
    }

    /// Evaluates the next unevaluated position.
    fn evaluate(&mut self) -> TransformEnvironment {
        let position = self.pending.len();
        let peeked = self.input.borrow_mut().peek(position);

        let dp = match peeked {
            Ok(Some(dp)) => dp,
            Ok(None) => return TransformEnvironment::finished(),
            Err(err) => return TransformEnvironment::failed(err),
        };

        let mut args = Vec::with_capacity(self.args.len());
        for (index, arg) in self.args.iter_mut().enumerate() {
            match arg.script.next() {
                Ok(Some(value)) => args.push(value),
                Ok(None) => {
                    return TransformEnvironment::failed(PipelineError::iterator(format!(
                        "Argument {} ended before its input at timestamp {}",
                        index + 1,
                        dp.timestamp
                    )))
                }
                Err(err) => return TransformEnvironment::failed(err),
            }
        }

        TransformEnvironment {
            datapoint: Some(dp),
            args,
            error: None,
        }
    }
}

// Lets a transform hand its input to code written against the plain iterator traits.
impl DatapointIterator for TransformIterator {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        TransformIterator::next(self).get()
    }
}

impl DatapointPeekIterator for TransformIterator {
    fn peek(&mut self, forward: usize) -> PipelineResult<Option<Datapoint>> {
        TransformIterator::peek(self, forward).get()
    }
}
