//! Deterministic k-way merge of timestamp-ordered iterators.

use super::DatapointIterator;
use crate::datapoint::Datapoint;
use crate::error::{PipelineError, PipelineResult};
use log::{debug, trace};

/// Merges several individually ordered iterators into one ordered iterator.
///
/// Each source keeps one head datapoint. `next()` returns the head with the
/// smallest timestamp; on ties the source with the lowest index wins, so the
/// output is stable.
///
/// A failure while refilling a head does not drop the datapoint that triggered
/// the refill: that datapoint is returned normally and the error is reported by
/// the following call, after which the merge stays failed.
pub struct MergeIterator<I> {
    sources: Vec<I>,
    heads: Vec<Option<Datapoint>>,
    deferred: Option<PipelineError>,
    failed: Option<PipelineError>,
}

impl<I: DatapointIterator> MergeIterator<I> {
    /// Primes one head per source. Fails if any priming pull fails.
    pub fn new(mut sources: Vec<I>) -> PipelineResult<Self> {
        let mut heads = Vec::with_capacity(sources.len());
        for source in sources.iter_mut() {
            heads.push(source.next()?);
        }
        debug!("Merging {} datapoint sources", sources.len());

        Ok(Self {
            sources,
            heads,
            deferred: None,
            failed: None,
        })
    }

    /// Number of sources that still have datapoints.
    pub fn active_sources(&self) -> usize {
        self.heads.iter().filter(|head| head.is_some()).count()
    }

    fn select(&self) -> Option<usize> {
        let mut selected: Option<(usize, f64)> = None;
        for (index, head) in self.heads.iter().enumerate() {
            if let Some(dp) = head {
                match selected {
                    Some((_, timestamp)) if dp.timestamp >= timestamp => {}
                    _ => selected = Some((index, dp.timestamp)),
                }
            }
        }
        selected.map(|(index, _)| index)
    }
}

impl<I: DatapointIterator> DatapointIterator for MergeIterator<I> {
    fn next(&mut self) -> PipelineResult<Option<Datapoint>> {
        if let Some(err) = self.deferred.take() {
            self.failed = Some(err.clone());
            return Err(err);
        }
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let Some(index) = self.select() else {
            return Ok(None);
        };
        trace!("Merge selected source {}", index);

        let dp = self.heads[index].take();
        match self.sources[index].next() {
            Ok(head) => self.heads[index] = head,
            Err(err) => self.deferred = Some(err),
        }
        Ok(dp)
    }
}

/// Merges the given iterators by increasing timestamp.
pub fn merge<I: DatapointIterator>(sources: Vec<I>) -> PipelineResult<MergeIterator<I>> {
    MergeIterator::new(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::testing::{points, FailingIterator};
    use crate::iterator::{collect_datapoints, DatapointArrayIterator};

    fn array(values: &[(f64, i64)]) -> Box<dyn DatapointIterator> {
        Box::new(DatapointArrayIterator::new(points(values)))
    }

    #[test]
    fn test_merge_two_sources() {
        let mut merged = merge(vec![
            array(&[(1.0, 5), (3.0, 3)]),
            array(&[(2.0, 5), (4.0, 1)]),
        ])
        .unwrap();

        let out = collect_datapoints(&mut merged).unwrap();
        assert_eq!(out, points(&[(1.0, 5), (2.0, 5), (3.0, 3), (4.0, 1)]));
        assert_eq!(merged.next().unwrap(), None);
    }

    #[test]
    fn test_ties_favor_lowest_source_index() {
        let mut merged = merge(vec![
            array(&[(1.0, 0), (2.0, 0)]),
            array(&[(1.0, 1), (2.0, 1)]),
            array(&[(1.0, 2)]),
        ])
        .unwrap();

        let out = collect_datapoints(&mut merged).unwrap();
        assert_eq!(
            out,
            points(&[(1.0, 0), (1.0, 1), (1.0, 2), (2.0, 0), (2.0, 1)])
        );
    }

    #[test]
    fn test_merge_is_sorted_multiset_union() {
        let a = points(&[(0.0, 1), (0.5, 2), (0.5, 3), (7.0, 4)]);
        let b = points(&[(0.25, 5), (0.5, 6), (9.0, 7)]);
        let c = points(&[]);
        let d = points(&[(8.0, 8)]);
        let mut merged = merge(vec![
            DatapointArrayIterator::new(a.clone()),
            DatapointArrayIterator::new(b.clone()),
            DatapointArrayIterator::new(c),
            DatapointArrayIterator::new(d.clone()),
        ])
        .unwrap();

        let out = collect_datapoints(&mut merged).unwrap();
        assert_eq!(out.len(), a.len() + b.len() + d.len());
        assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        for dp in a.iter().chain(b.iter()).chain(d.iter()) {
            assert!(out.contains(dp));
        }
    }

    #[test]
    fn test_empty_merge_ends_immediately() {
        let mut merged = merge(Vec::<DatapointArrayIterator>::new()).unwrap();
        assert_eq!(merged.next().unwrap(), None);
        assert_eq!(merged.active_sources(), 0);
    }

    #[test]
    fn test_priming_failure_fails_construction() {
        let sources: Vec<Box<dyn DatapointIterator>> = vec![
            array(&[(1.0, 1)]),
            Box::new(FailingIterator::new(vec![])),
        ];
        assert!(merge(sources).is_err());
    }

    #[test]
    fn test_refill_error_surfaces_after_its_datapoint() {
        let sources: Vec<Box<dyn DatapointIterator>> = vec![
            Box::new(FailingIterator::new(points(&[(1.0, 1)]))),
            array(&[(2.0, 2)]),
        ];
        let mut merged = merge(sources).unwrap();

        // the datapoint whose refill failed is still delivered
        assert_eq!(merged.next().unwrap(), Some(Datapoint::new(1.0, 1)));
        let err = merged.next().unwrap_err();
        assert_eq!(err, PipelineError::iterator("source failed"));
        assert_eq!(merged.next().unwrap_err(), err);
    }
}
