//! Read-only cursors over a shared [`PeekIterator`](super::PeekIterator).

use super::peek::{DatapointPeekIterator, SharedPeekIterator};
use super::DatapointIterator;
use crate::datapoint::Datapoint;
use crate::error::PipelineResult;
use std::rc::Rc;

/// Behaves as a peek iterator without ever calling `next()` on the shared
/// iterator underneath.
///
/// Each virtual cursor keeps a private offset relative to the shared iterator's
/// current position, so any number of them can observe the same datapoints as
/// the real consumer without disturbing it. When the real consumer commits
/// `n` datapoints, [`set_back`](Self::set_back) realigns the cursor.
pub struct VirtualPeekIterator<I> {
    shared: SharedPeekIterator<I>,
    offset: usize,
}

impl<I: DatapointIterator> VirtualPeekIterator<I> {
    pub fn new(shared: SharedPeekIterator<I>) -> Self {
        Self { shared, offset: 0 }
    }

    /// Current position relative to the shared iterator.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Moves the cursor back after the shared iterator was advanced `num` times.
    pub fn set_back(&mut self, num: usize) {
        self.offset = self.offset.saturating_sub(num);
    }

    /// Moves the cursor to the shared iterator's current position.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Opens another independent cursor over the same shared iterator.
    pub fn fork(&self) -> Self {
        Self::new(Rc::clone(&self.shared))
    }
}

impl<I: DatapointIterator> DatapointIterator for VirtualPeekIterator<I> {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        let dp = self.shared.borrow_mut().peek(self.offset);
        self.offset += 1;
        dp
    }
}

impl<I: DatapointIterator> DatapointPeekIterator for VirtualPeekIterator<I> {
    fn peek(&mut self, forward: usize) -> PipelineResult<Option<Datapoint>> {
        self.shared.borrow_mut().peek(self.offset + forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::testing::points;
    use crate::iterator::{collect_datapoints, DatapointArrayIterator, PeekIterator};

    fn source() -> Vec<Datapoint> {
        points(&[(1.0, 10), (2.0, 20), (3.0, 30), (4.0, 40)])
    }

    #[test]
    fn test_virtual_next_and_peek() {
        let shared = PeekIterator::shared(DatapointArrayIterator::new(source()));
        let mut cursor = VirtualPeekIterator::new(Rc::clone(&shared));

        assert_eq!(cursor.next().unwrap().unwrap().timestamp, 1.0);
        assert_eq!(cursor.peek(0).unwrap().unwrap().timestamp, 2.0);
        assert_eq!(cursor.peek(2).unwrap().unwrap().timestamp, 4.0);
        assert_eq!(cursor.peek(3).unwrap(), None);
        assert_eq!(cursor.offset(), 1);

        // the shared iterator was never advanced
        assert_eq!(shared.borrow_mut().next().unwrap().unwrap().timestamp, 1.0);
    }

    #[test]
    fn test_set_back_realigns_after_commit() {
        let shared = PeekIterator::shared(DatapointArrayIterator::new(source()));
        let mut cursor = VirtualPeekIterator::new(Rc::clone(&shared));

        cursor.next().unwrap();
        cursor.next().unwrap();
        shared.borrow_mut().next().unwrap();
        cursor.set_back(1);
        assert_eq!(cursor.next().unwrap().unwrap().timestamp, 3.0);

        cursor.set_back(100);
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.peek(0).unwrap().unwrap().timestamp, 2.0);

        cursor.next().unwrap();
        cursor.reset();
        assert_eq!(cursor.next().unwrap().unwrap().timestamp, 2.0);
    }

    #[test]
    fn test_virtual_cursors_never_disturb_direct_consumer() {
        let shared = PeekIterator::shared(DatapointArrayIterator::new(source()));
        let mut a = VirtualPeekIterator::new(Rc::clone(&shared));
        let mut b = a.fork();

        // arbitrary interleaving of virtual operations
        a.peek(3).unwrap();
        b.next().unwrap();
        b.next().unwrap();
        a.next().unwrap();
        b.set_back(1);
        a.reset();
        b.peek(7).unwrap();
        a.next().unwrap();

        let direct = collect_datapoints(&mut *shared.borrow_mut()).unwrap();
        assert_eq!(direct, source());

        // after the direct consumer drained everything, cursors see the end
        a.reset();
        assert_eq!(a.next().unwrap(), None);
    }
}
