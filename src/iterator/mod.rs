//! # Datapoint iterators
//!
//! Pull-based streams of timestamped datapoints.
//!
//! Every iterator reports one of three outcomes from `next()`:
//!
//! * `Ok(Some(dp))` - the next datapoint
//! * `Ok(None)` - end of stream
//! * `Err(e)` - a terminal failure; the iterator is invalid afterwards and must
//!   keep reporting an equivalent error or end of stream
//!
//! ## Components
//!
//! * [`PeekIterator`] - buffered look-ahead over any iterator
//! * [`VirtualPeekIterator`] - private read-only cursor over a shared [`PeekIterator`]
//! * [`MergeIterator`] - deterministic k-way timestamp merge
//! * [`InjectionPoint`] - one-slot stand-in source used by control-flow transforms
//! * [`OrderedIterator`] - rejects streams whose timestamps decrease

pub mod injection;
pub mod merge;
pub mod peek;
pub mod virtual_peek;

pub use injection::InjectionPoint;
pub use merge::{merge, MergeIterator};
pub use peek::{DatapointPeekIterator, PeekIterator, SharedPeekIterator};
pub use virtual_peek::VirtualPeekIterator;

use crate::datapoint::Datapoint;
use crate::error::{PipelineError, PipelineResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Pull contract shared by every datapoint source in the engine.
pub trait DatapointIterator {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>>;
}

impl<T> DatapointIterator for Box<T>
where
    T: DatapointIterator + ?Sized,
{
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        self.as_mut().next()
    }
}

impl<T> DatapointIterator for &mut T
where
    T: DatapointIterator + ?Sized,
{
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        (**self).next()
    }
}

// Shared handles let a consumer keep control of an iterator it hands to a script.
impl<T> DatapointIterator for Rc<RefCell<T>>
where
    T: DatapointIterator + ?Sized,
{
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        self.borrow_mut().next()
    }
}

/// Iterates through an owned array of datapoints.
#[derive(Debug, Clone)]
pub struct DatapointArrayIterator {
    datapoints: std::vec::IntoIter<Datapoint>,
}

impl DatapointArrayIterator {
    pub fn new(datapoints: Vec<Datapoint>) -> Self {
        Self {
            datapoints: datapoints.into_iter(),
        }
    }
}

impl From<Vec<Datapoint>> for DatapointArrayIterator {
    fn from(datapoints: Vec<Datapoint>) -> Self {
        Self::new(datapoints)
    }
}

impl DatapointIterator for DatapointArrayIterator {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        Ok(self.datapoints.next())
    }
}

/// Fails a stream as soon as a timestamp decreases.
pub struct OrderedIterator<I> {
    inner: I,
    name: String,
    last_timestamp: Option<f64>,
    failed: Option<PipelineError>,
}

impl<I> OrderedIterator<I> {
    /// `name` identifies the source in the error message.
    pub fn new(inner: I, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
            last_timestamp: None,
            failed: None,
        }
    }
}

impl<I: DatapointIterator> DatapointIterator for OrderedIterator<I> {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let dp = match self.inner.next() {
            Ok(Some(dp)) => dp,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.failed = Some(err.clone());
                return Err(err);
            }
        };

        if let Some(previous) = self.last_timestamp {
            if dp.timestamp < previous {
                let err = PipelineError::iterator(format!(
                    "Source '{}' is out of order: timestamp {} follows {}",
                    self.name, dp.timestamp, previous
                ));
                self.failed = Some(err.clone());
                return Err(err);
            }
        }
        self.last_timestamp = Some(dp.timestamp);
        Ok(Some(dp))
    }
}

/// Drains an iterator into a vector, stopping at the first error.
pub fn collect_datapoints<I>(iter: &mut I) -> PipelineResult<Vec<Datapoint>>
where
    I: DatapointIterator + ?Sized,
{
    let mut out = Vec::new();
    while let Some(dp) = iter.next()? {
        out.push(dp);
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Yields its datapoints, then fails on every later call.
    pub(crate) struct FailingIterator {
        datapoints: std::vec::IntoIter<Datapoint>,
        pub(crate) calls_after_failure: usize,
        failed: bool,
    }

    impl FailingIterator {
        pub(crate) fn new(datapoints: Vec<Datapoint>) -> Self {
            Self {
                datapoints: datapoints.into_iter(),
                calls_after_failure: 0,
                failed: false,
            }
        }
    }

    impl DatapointIterator for FailingIterator {
        fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
            if let Some(dp) = self.datapoints.next() {
                return Ok(Some(dp));
            }
            if self.failed {
                self.calls_after_failure += 1;
            }
            self.failed = true;
            Err(PipelineError::iterator("source failed"))
        }
    }

    pub(crate) fn points(values: &[(f64, i64)]) -> Vec<Datapoint> {
        values
            .iter()
            .map(|(t, v)| Datapoint::new(*t, *v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::points;
    use super::*;

    #[test]
    fn test_array_iterator_yields_in_order_then_ends() {
        let mut iter = DatapointArrayIterator::new(points(&[(1.0, 1), (2.0, 2)]));
        assert_eq!(iter.next().unwrap(), Some(Datapoint::new(1.0, 1)));
        assert_eq!(iter.next().unwrap(), Some(Datapoint::new(2.0, 2)));
        assert_eq!(iter.next().unwrap(), None);
        assert_eq!(iter.next().unwrap(), None);
    }

    #[test]
    fn test_shared_handle_drives_same_iterator() {
        let shared = Rc::new(RefCell::new(DatapointArrayIterator::new(points(&[
            (1.0, 1),
            (2.0, 2),
        ]))));
        let mut handle = Rc::clone(&shared);
        assert_eq!(handle.next().unwrap().unwrap().timestamp, 1.0);
        assert_eq!(shared.borrow_mut().next().unwrap().unwrap().timestamp, 2.0);
    }

    #[test]
    fn test_ordered_iterator_rejects_decreasing_timestamps() {
        let mut iter = OrderedIterator::new(
            DatapointArrayIterator::new(points(&[(1.0, 1), (1.0, 2), (0.5, 3)])),
            "input.json",
        );
        assert!(iter.next().unwrap().is_some());
        assert!(iter.next().unwrap().is_some());
        let err = iter.next().unwrap_err();
        assert!(err.to_string().contains("input.json"));
        assert_eq!(iter.next().unwrap_err(), err);
    }

    #[test]
    fn test_collect_stops_on_error() {
        let mut iter = testing::FailingIterator::new(points(&[(1.0, 1)]));
        assert!(collect_datapoints(&mut iter).is_err());
    }
}
