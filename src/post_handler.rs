//! Deferred cross-header post-processing.
//!
//! Field closures register a handler when a value depends on state that is not available
//! yet: a checksum over the finished payload, a length covering headers that have not
//! been encoded, a pseudo-header built from another header's addresses. The engine keeps
//! one list per header occurrence and, once the main pass is over, turns all lists into a
//! single execution order with [`schedule`]:
//!
//! 1. each list is sorted by registration priority (stable) and priorities become
//!    1-based ranks;
//! 2. the index factor is the smallest power of ten, starting at 10, above the largest
//!    rank, so header position and rank never collide;
//! 3. the combined priority is `(header_index + 1) * factor + rank`;
//! 4. decode runs the header groups in physical order, encode runs them innermost first.
//!    Within a group handlers always run by ascending rank.
//!
//! Handlers run strictly one after another since each may read what the previous one
//! wrote into the packet.

use crate::codec::CodecError;
use crate::header::Header;
use std::fmt;

/// Deferred action. Receives the accessor of the header that registered it.
pub type PostHandler = Box<dyn FnOnce(&mut Header<'_>) -> Result<(), CodecError>>;

pub struct PostHandlerItem {
    pub priority: i64,
    pub handler: PostHandler,
}

impl PostHandlerItem {
    pub fn new<F>(priority: i64, handler: F) -> Self
    where
        F: FnOnce(&mut Header<'_>) -> Result<(), CodecError> + 'static,
    {
        PostHandlerItem {
            priority,
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for PostHandlerItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostHandlerItem")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Which pass the handlers belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Decode,
    Encode,
}

/// A handler placed in the global order.
pub struct ScheduledHandler {
    pub module_index: usize,
    pub priority: i64,
    pub handler: PostHandler,
}

impl fmt::Debug for ScheduledHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledHandler")
            .field("module_index", &self.module_index)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Ascending by priority; equal priorities keep registration order.
pub fn sort_by_priority(items: &mut [PostHandlerItem]) {
    items.sort_by_key(|item| item.priority);
}

/// Smallest power of ten, at least 10, strictly greater than `max_rank`.
pub fn index_factor(max_rank: usize) -> i64 {
    let mut factor: i64 = 10;
    while factor <= max_rank as i64 {
        factor *= 10;
    }
    factor
}

/// Flatten per-header handler lists into one execution order.
pub fn schedule(groups: Vec<Vec<PostHandlerItem>>, direction: Direction) -> Vec<ScheduledHandler> {
    let factor = index_factor(groups.iter().map(Vec::len).max().unwrap_or(0));
    let mut ordered: Vec<Vec<ScheduledHandler>> = groups
        .into_iter()
        .enumerate()
        .map(|(module_index, mut items)| {
            sort_by_priority(&mut items);
            let base = (module_index as i64 + 1) * factor;
            items
                .into_iter()
                .enumerate()
                .map(|(rank, item)| ScheduledHandler {
                    module_index,
                    priority: base + rank as i64 + 1,
                    handler: item.handler,
                })
                .collect()
        })
        .collect();
    if direction == Direction::Encode {
        ordered.reverse();
    }
    ordered.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(priority: i64) -> PostHandlerItem {
        PostHandlerItem::new(priority, |_| Ok(()))
    }

    fn layout(scheduled: &[ScheduledHandler]) -> Vec<(usize, i64)> {
        scheduled.iter().map(|s| (s.module_index, s.priority)).collect()
    }

    #[test]
    fn index_factor_grows_past_the_largest_rank() {
        assert_eq!(index_factor(0), 10);
        assert_eq!(index_factor(9), 10);
        assert_eq!(index_factor(10), 100);
        assert_eq!(index_factor(99), 100);
        assert_eq!(index_factor(100), 1000);
    }

    #[test]
    fn decode_order_follows_headers() {
        let groups = vec![vec![noop(5), noop(1)], vec![], vec![noop(0)]];
        let s = schedule(groups, Direction::Decode);
        assert_eq!(layout(&s), vec![(0, 11), (0, 12), (2, 31)]);
    }

    #[test]
    fn encode_order_reverses_groups_only() {
        let groups = vec![vec![noop(2), noop(1)], vec![noop(7)], vec![noop(3), noop(3)]];
        let s = schedule(groups, Direction::Encode);
        assert_eq!(layout(&s), vec![(2, 31), (2, 32), (1, 21), (0, 11), (0, 12)]);
    }

    #[test]
    fn wide_groups_widen_the_factor() {
        let groups = vec![(0..12).map(noop).collect(), vec![noop(0)]];
        let s = schedule(groups, Direction::Decode);
        assert_eq!(s.first().map(|h| h.priority), Some(101));
        assert_eq!(s.last().map(|h| (h.module_index, h.priority)), Some((1, 201)));
    }
}
