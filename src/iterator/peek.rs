//! Buffered look-ahead over a datapoint iterator.

use super::DatapointIterator;
use crate::datapoint::Datapoint;
use crate::error::{PipelineError, PipelineResult};
use log::trace;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A [`DatapointIterator`] that can look ahead without consuming.
pub trait DatapointPeekIterator: DatapointIterator {
    /// Returns the datapoint `forward` positions ahead. `peek(0)` is the value
    /// `next()` would return.
    fn peek(&mut self, forward: usize) -> PipelineResult<Option<Datapoint>>;
}

/// A peek iterator shared between its real consumer and any number of
/// [`VirtualPeekIterator`](super::VirtualPeekIterator)s.
pub type SharedPeekIterator<I> = Rc<RefCell<PeekIterator<I>>>;

/// How the underlying iterator ended.
#[derive(Debug, Clone, PartialEq)]
enum Terminal {
    Finished,
    Failed(PipelineError),
}

impl Terminal {
    fn result(&self) -> PipelineResult<Option<Datapoint>> {
        match self {
            Terminal::Finished => Ok(None),
            Terminal::Failed(err) => Err(err.clone()),
        }
    }
}

/// Permits peeking ahead in a datapoint sequence.
///
/// Datapoints pulled for a peek are kept in arrival order and handed out by
/// `next()` before the underlying iterator is pulled again. Once the underlying
/// iterator ends or fails, that outcome is cached and the source is never
/// called again.
pub struct PeekIterator<I> {
    source: I,
    buffer: VecDeque<Datapoint>,
    terminal: Option<Terminal>,
}

impl<I: DatapointIterator> PeekIterator<I> {
    pub fn new(source: I) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            terminal: None,
        }
    }

    /// Wraps the iterator for sharing with virtual cursors.
    pub fn shared(source: I) -> SharedPeekIterator<I> {
        Rc::new(RefCell::new(Self::new(source)))
    }

    /// Number of datapoints pulled from the source but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the underlying iterator has ended or failed.
    pub fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn source(&self) -> &I {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut I {
        &mut self.source
    }

    /// Drops buffered datapoints and the cached terminal state, e.g. after the
    /// source has been replaced.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.terminal = None;
    }

    fn pull(&mut self) -> PipelineResult<Option<Datapoint>> {
        match self.source.next() {
            Ok(Some(dp)) => Ok(Some(dp)),
            Ok(None) => {
                self.terminal = Some(Terminal::Finished);
                Ok(None)
            }
            Err(err) => {
                self.terminal = Some(Terminal::Failed(err.clone()));
                Err(err)
            }
        }
    }
}

impl<I: DatapointIterator> DatapointIterator for PeekIterator<I> {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        if let Some(dp) = self.buffer.pop_front() {
            return Ok(Some(dp));
        }
        if let Some(terminal) = &self.terminal {
            return terminal.result();
        }
        self.pull()
    }
}

impl<I: DatapointIterator> DatapointPeekIterator for PeekIterator<I> {
    fn peek(&mut self, forward: usize) -> PipelineResult<Option<Datapoint>> {
        // VecDeque gives O(1) access from either end, so a buffered position is
        // read directly.
        if let Some(dp) = self.buffer.get(forward) {
            return Ok(Some(dp.clone()));
        }
        if let Some(terminal) = &self.terminal {
            return terminal.result();
        }

        trace!(
            "Extending peek buffer from {} to {} datapoints",
            self.buffer.len(),
            forward + 1
        );
        while self.buffer.len() <= forward {
            match self.pull()? {
                Some(dp) => self.buffer.push_back(dp),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.get(forward).cloned())
    }
}
