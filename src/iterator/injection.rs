//! One-slot stand-in source for sub-pipelines driven by a transform.

use super::DatapointIterator;
use crate::datapoint::Datapoint;
use crate::error::{PipelineError, PipelineResult};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Ready(Datapoint),
    Finished,
    Failed(PipelineError),
}

/// A source that holds at most one datapoint, set immediately before the
/// pipeline reading from it is pulled.
///
/// A datapoint is handed out exactly once; reading the slot again before it is
/// refilled is an error. End of stream and failures stay in the slot until it
/// is cleared.
///
/// Handles returned by [`share`](Self::share) refer to the same slot. There is
/// no `Clone`; a cloned transform allocates a new injection point.
#[derive(Debug, Default)]
pub struct InjectionPoint {
    slot: Rc<RefCell<Slot>>,
}

impl InjectionPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns another handle to the same slot.
    pub fn share(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }

    pub fn set(&self, dp: Datapoint) {
        *self.slot.borrow_mut() = Slot::Ready(dp);
    }

    /// Signals end of stream to the reader.
    pub fn finish(&self) {
        *self.slot.borrow_mut() = Slot::Finished;
    }

    /// Hands `err` to the reader. Like end of stream, it stays until cleared.
    pub fn fail(&self, err: PipelineError) {
        *self.slot.borrow_mut() = Slot::Failed(err);
    }

    pub fn clear(&self) {
        *self.slot.borrow_mut() = Slot::Empty;
    }

    /// Whether a datapoint is waiting to be read.
    pub fn is_pending(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Ready(_))
    }
}

impl DatapointIterator for InjectionPoint {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        let mut slot = self.slot.borrow_mut();
        match std::mem::take(&mut *slot) {
            Slot::Ready(dp) => Ok(Some(dp)),
            Slot::Finished => {
                *slot = Slot::Finished;
                Ok(None)
            }
            Slot::Failed(err) => {
                *slot = Slot::Failed(err.clone());
                Err(err)
            }
            Slot::Empty => Err(PipelineError::iterator(
                "Injection point was read before a datapoint was set",
            )),
        }
    }
}
