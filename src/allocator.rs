//! Frame allocation for new tables and pages.
//!
//! Three tiers, first match wins:
//! 1. reclaim an all-zero table that is off the current route,
//! 2. take the frame just above the highest one referenced in the tree,
//! 3. evict the page chosen by [`select_victim`].

use log::debug;

use crate::config::VmConfig;
use crate::constants::*;
use crate::eviction::select_victim;
use crate::memory::FrameStore;
use crate::translation::Route;
use crate::tree::{PageTree, detach};

/// Where a granted frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// An empty table was unlinked and handed out.
    ReusedTable(FrameIndex),
    /// A frame no table has referenced yet.
    Unused(FrameIndex),
    /// A resident page was written to disk and its frame handed out.
    Evicted { frame: FrameIndex, page: PageNumber },
}

impl Allocation {
    pub fn frame(&self) -> FrameIndex {
        match *self {
            Allocation::ReusedTable(frame) | Allocation::Unused(frame) => frame,
            Allocation::Evicted { frame, .. } => frame,
        }
    }
}

/// Grant a frame for the walk towards `target`, never touching frames on `route`.
///
/// The frame comes back unlinked but with stale contents; the caller zero-fills it.
pub fn acquire<S: FrameStore>(store: &mut S, config: &VmConfig, target: PageNumber, route: &Route) -> Allocation {
    let (empty_table, max_frame) = {
        let tree = PageTree::new(store, config);
        (tree.find_empty_table(route), tree.max_frame_index())
    };

    if let Some(frame) = empty_table {
        let unlinked = detach(store, config, frame);
        assert!(unlinked, "empty table {frame} found in the tree but has no parent entry");
        debug!("reuse empty table frame {frame} for page {target}");
        return Allocation::ReusedTable(frame);
    }

    if max_frame + 1 < config.num_frames {
        let frame = max_frame + 1;
        debug!("allocate unused frame {frame} for page {target}");
        return Allocation::Unused(frame);
    }

    let Some(victim) = select_victim(&PageTree::new(store, config), target) else {
        panic!(
            "no frame can be reclaimed for page {target}: {} frames cannot hold a depth {} path",
            config.num_frames, config.tables_depth
        );
    };
    assert!(
        !route.contains(victim.frame),
        "eviction picked frame {} on the active route",
        victim.frame
    );
    debug!(
        "evict page {} from frame {} (distance {}) for page {target}",
        victim.page, victim.frame, victim.distance
    );
    store.evict(victim.frame, victim.page);
    detach(store, config, victim.frame);
    Allocation::Evicted {
        frame: victim.frame,
        page: victim.page,
    }
}
