//! Read-only walks over the page-table tree stored in a [`FrameStore`].
//!
//! Frames carry no role tag: a frame reached after `d` edges from the root is a
//! table while `d < tables_depth` and a data page once `d == tables_depth`.
//! Every walk below threads that depth explicitly and never looks inside data
//! pages for pointer-shaped values.

use std::collections::HashSet;

use log::debug;

use crate::config::VmConfig;
use crate::constants::*;
use crate::memory::FrameStore;
use crate::translation::Route;

/// A page currently resident in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPage {
    pub page: PageNumber,
    pub frame: FrameIndex,
}

pub struct PageTree<'a, S: FrameStore> {
    store: &'a S,
    config: &'a VmConfig,
}

impl<'a, S: FrameStore> PageTree<'a, S> {
    pub fn new(store: &'a S, config: &'a VmConfig) -> Self {
        PageTree { store, config }
    }

    pub fn config(&self) -> &VmConfig {
        self.config
    }

    #[inline]
    pub fn entry(&self, frame: FrameIndex, index: u64) -> Word {
        self.store.read(self.config.word_address(frame, index))
    }

    /// Non-zero entries of a table frame as `(index, child)` pairs, in index order.
    pub fn children(&self, frame: FrameIndex) -> impl Iterator<Item = (u64, FrameIndex)> + '_ {
        (0..self.config.page_size()).filter_map(move |index| {
            let word = self.entry(frame, index);
            (word != 0).then_some((index, word as FrameIndex))
        })
    }

    /// Frames reached after `tables_depth` edges hold data, not entries.
    #[inline]
    pub fn is_leaf_depth(&self, depth: u32) -> bool {
        depth >= self.config.tables_depth
    }

    /// First non-root table whose entries are all zero and which is not on
    /// `route`, searching depth-first in index order.
    pub fn find_empty_table(&self, route: &Route) -> Option<FrameIndex> {
        self.empty_table_below(ROOT_FRAME, 0, route)
    }

    fn empty_table_below(&self, frame: FrameIndex, depth: u32, route: &Route) -> Option<FrameIndex> {
        if self.is_leaf_depth(depth) {
            return None;
        }
        let mut children = self.children(frame).peekable();
        if children.peek().is_none() {
            return (frame != ROOT_FRAME && !route.contains(frame)).then_some(frame);
        }
        children.find_map(|(_, child)| self.empty_table_below(child, depth + 1, route))
    }

    /// Largest frame index referenced by any table entry, or 0 for an empty tree.
    pub fn max_frame_index(&self) -> FrameIndex {
        self.max_below(ROOT_FRAME, 0)
    }

    fn max_below(&self, frame: FrameIndex, depth: u32) -> FrameIndex {
        if self.is_leaf_depth(depth) {
            return 0;
        }
        self.children(frame)
            .map(|(_, child)| child.max(self.max_below(child, depth + 1)))
            .max()
            .unwrap_or(0)
    }

    /// Absolute address of the table entry pointing at `frame`, if any.
    pub fn parent_entry(&self, frame: FrameIndex) -> Option<u64> {
        self.parent_entry_below(ROOT_FRAME, 0, frame)
    }

    fn parent_entry_below(&self, table: FrameIndex, depth: u32, target: FrameIndex) -> Option<u64> {
        if self.is_leaf_depth(depth) {
            return None;
        }
        self.children(table).find_map(|(index, child)| {
            if child == target {
                Some(self.config.word_address(table, index))
            } else {
                self.parent_entry_below(child, depth + 1, target)
            }
        })
    }

    /// Every resident page, in depth-first index order.
    pub fn leaves(&self) -> Vec<MappedPage> {
        let mut pages = Vec::new();
        self.collect_leaves(ROOT_FRAME, 0, 0, &mut pages);
        pages
    }

    fn collect_leaves(&self, frame: FrameIndex, depth: u32, page: PageNumber, out: &mut Vec<MappedPage>) {
        if self.is_leaf_depth(depth) {
            out.push(MappedPage { page, frame });
            return;
        }
        for (index, child) in self.children(frame) {
            self.collect_leaves(child, depth + 1, self.extend_page(page, index), out);
        }
    }

    /// Append one table index to a partially built page number.
    #[inline]
    pub fn extend_page(&self, page: PageNumber, index: u64) -> PageNumber {
        (page << self.config.offset_width) | index
    }

    /// Panics unless every edge points inside the pool, never at the root, and
    /// no frame is linked from more than one entry.
    pub fn check_invariants(&self) {
        let mut seen = HashSet::new();
        self.check_below(ROOT_FRAME, 0, &mut seen);
    }

    fn check_below(&self, frame: FrameIndex, depth: u32, seen: &mut HashSet<FrameIndex>) {
        if self.is_leaf_depth(depth) {
            return;
        }
        for (index, child) in self.children(frame) {
            assert!(
                child < self.config.num_frames,
                "frame {frame} entry {index} points outside the pool: {child}"
            );
            assert!(
                child != ROOT_FRAME,
                "frame {frame} entry {index} links back to the root"
            );
            assert!(
                seen.insert(child),
                "frame {child} linked from more than one table entry (again at frame {frame} entry {index})"
            );
            self.check_below(child, depth + 1, seen);
        }
    }
}

/// Clear the single table entry that points at `frame`.
///
/// Returns whether a link was found; an unlinked frame is left alone.
pub fn detach<S: FrameStore>(store: &mut S, config: &VmConfig, frame: FrameIndex) -> bool {
    let Some(address) = PageTree::new(store, config).parent_entry(frame) else {
        return false;
    };
    debug!("detach frame {frame} (entry at {address})");
    store.write(address, 0);
    true
}
