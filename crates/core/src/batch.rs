//! Candidate batching.
//!
//! Batches bound how many deliveries are in flight at once: the loop drains
//! one batch completely before it starts the next.

use crate::value_object::BatchSize;

/// Split `items` into consecutive chunks of at most `size` elements.
///
/// Order is preserved and nothing is dropped or duplicated: concatenating the
/// result yields `items` again. Only the last chunk may be shorter. An empty
/// input produces no chunks.
pub fn partition<T>(items: Vec<T>, size: BatchSize) -> Vec<Vec<T>> {
    let size = size.get();
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }

    batches
}
