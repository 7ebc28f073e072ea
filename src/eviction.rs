//! Eviction victim selection.
//!
//! The resident page farthest from the incoming page on the page-number ring
//! is evicted. Ties go to the first page met in depth-first, index-ascending
//! order.

use crate::constants::*;
use crate::memory::FrameStore;
use crate::tree::PageTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victim {
    pub frame: FrameIndex,
    pub page: PageNumber,
    pub distance: u64,
}

/// Wrap-around distance between two page numbers on a ring of `num_pages`.
#[inline]
pub fn cyclic_distance(a: PageNumber, b: PageNumber, num_pages: u64) -> u64 {
    let direct = a.abs_diff(b);
    direct.min(num_pages - direct)
}

/// Pick the resident page to evict in favour of `incoming`.
///
/// Returns `None` only when no page is resident.
pub fn select_victim<S: FrameStore>(tree: &PageTree<'_, S>, incoming: PageNumber) -> Option<Victim> {
    best_below(tree, ROOT_FRAME, 0, 0, incoming)
}

fn best_below<S: FrameStore>(
    tree: &PageTree<'_, S>,
    frame: FrameIndex,
    depth: u32,
    page: PageNumber,
    incoming: PageNumber,
) -> Option<Victim> {
    if tree.is_leaf_depth(depth) {
        return Some(Victim {
            frame,
            page,
            distance: cyclic_distance(page, incoming, tree.config().num_pages()),
        });
    }
    tree.children(frame)
        .filter_map(|(index, child)| best_below(tree, child, depth + 1, tree.extend_page(page, index), incoming))
        .fold(None, |best: Option<Victim>, candidate| match best {
            Some(best) if best.distance >= candidate.distance => Some(best),
            _ => Some(candidate),
        })
}
