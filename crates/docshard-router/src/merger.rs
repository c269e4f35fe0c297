//! Result merger
//!
//! Reassembles per-shard answers into the single response a caller expects:
//! positional results for id batches, a k-way merge for sorted broadcast
//! queries, and plain concatenation in registry order otherwise.

use docshard_types::{Document, SortSpec};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Answer from one shard to a positional batch request
#[derive(Debug, Clone)]
pub struct PositionalBatch<T> {
    /// Caller positions covered by this shard, in request order
    pub positions: Vec<usize>,
    /// One entry per position; a short answer leaves the tail as misses
    pub results: Vec<Option<T>>,
}

/// Stateless merge operations
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMerger;

impl ResultMerger {
    /// Put batch results back into caller order, filling misses with None
    pub fn merge_positional<T>(len: usize, batches: Vec<PositionalBatch<T>>) -> Vec<Option<T>> {
        let mut merged: Vec<Option<T>> = std::iter::repeat_with(|| None).take(len).collect();
        for batch in batches {
            for (position, result) in batch.positions.into_iter().zip(batch.results) {
                if let Some(slot) = merged.get_mut(position) {
                    *slot = result;
                }
            }
        }
        merged
    }

    /// Merge broadcast query results
    ///
    /// `per_shard` must be in registry order. With a sort, each shard's
    /// stream is expected to be sorted already and the streams are k-way
    /// merged; ties keep registry order. The limit is applied after merging.
    pub fn merge_query(
        per_shard: Vec<Vec<Document>>,
        sort: Option<&SortSpec>,
        limit: Option<usize>,
    ) -> Vec<Document> {
        let mut merged = match sort {
            Some(spec) => Self::merge_sorted(per_shard, spec, limit),
            None => per_shard.into_iter().flatten().collect(),
        };
        if let Some(limit) = limit {
            merged.truncate(limit);
        }
        merged
    }

    fn merge_sorted(per_shard: Vec<Vec<Document>>, spec: &SortSpec, limit: Option<usize>) -> Vec<Document> {
        let total: usize = per_shard.iter().map(Vec::len).sum();
        let wanted = limit.map_or(total, |l| l.min(total));

        let mut streams: Vec<std::vec::IntoIter<Document>> =
            per_shard.into_iter().map(Vec::into_iter).collect();
        let mut heap = BinaryHeap::with_capacity(streams.len());
        for (shard, stream) in streams.iter_mut().enumerate() {
            if let Some(doc) = stream.next() {
                heap.push(HeapItem { doc, shard, spec });
            }
        }

        let mut merged = Vec::with_capacity(wanted);
        while merged.len() < wanted {
            let Some(HeapItem { doc, shard, .. }) = heap.pop() else {
                break;
            };
            if let Some(next) = streams[shard].next() {
                heap.push(HeapItem {
                    doc: next,
                    shard,
                    spec,
                });
            }
            merged.push(doc);
        }

        trace!(total, merged = merged.len(), "K-way merged shard results");
        merged
    }
}

/// Head of one shard stream
struct HeapItem<'a> {
    doc: Document,
    shard: usize,
    spec: &'a SortSpec,
}

impl Eq for HeapItem<'_> {}

impl PartialEq for HeapItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for HeapItem<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we pop the smallest head
        self.spec
            .compare(&self.doc, &other.doc)
            .then(self.shard.cmp(&other.shard))
            .reverse()
    }
}

impl PartialOrd for HeapItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
