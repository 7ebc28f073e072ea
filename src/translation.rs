use log::trace;

use crate::allocator::{Allocation, acquire};
use crate::config::VmConfig;
use crate::constants::*;
use crate::memory::FrameStore;

/// Represents the decomposed components of a Virtual Address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: u64,
    /// One table index per level, root level first.
    pub indices: Vec<u64>,
    pub page: PageNumber,
    pub offset: u64,
}

impl VirtualAddress {
    /// Decompose a raw VA into its components
    pub fn decompose(va: u64, config: &VmConfig) -> Self {
        let mask = config.index_mask();
        let depth = config.tables_depth;
        let indices = (0..depth)
            .map(|level| (va >> (config.offset_width * (depth - level))) & mask)
            .collect();

        VirtualAddress {
            va,
            indices,
            page: va >> config.offset_width,
            offset: va & mask,
        }
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VA({}) = (indices={:?}, page={}, offset={})",
            self.va, self.indices, self.page, self.offset
        )
    }
}

/// Frames visited while resolving one address. None of them may be reclaimed
/// before the walk finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    frames: Vec<FrameIndex>,
}

impl Route {
    pub fn new(depth: u32) -> Self {
        Route {
            frames: Vec::with_capacity(depth as usize),
        }
    }

    pub fn push(&mut self, frame: FrameIndex) {
        self.frames.push(frame);
    }

    /// The root is always part of every route.
    pub fn contains(&self, frame: FrameIndex) -> bool {
        frame == ROOT_FRAME || self.frames.contains(&frame)
    }

    /// Frames below the root, one per level walked so far.
    pub fn frames(&self) -> &[FrameIndex] {
        &self.frames
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write(Word),
}

/// Result of a completed walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// The word read, or the word just written.
    pub value: Word,
    /// Data frame holding the page.
    pub frame: FrameIndex,
    pub route: Route,
    /// One entry per missing link filled in on the way down.
    pub faults: Vec<Allocation>,
}

/// Zero every word of `frame`.
pub fn clear_frame<S: FrameStore>(store: &mut S, config: &VmConfig, frame: FrameIndex) {
    for index in 0..config.page_size() {
        store.write(config.word_address(frame, index), 0);
    }
}

/// Walk the tree for `va`, filling in missing tables and the page itself, then
/// perform `access` on the page.
///
/// The caller has already checked that `va` lies inside the address space.
pub fn translate<S: FrameStore>(store: &mut S, config: &VmConfig, va: &VirtualAddress, access: Access) -> Translation {
    let mut route = Route::new(config.tables_depth);
    let mut faults = Vec::new();
    let mut frame = ROOT_FRAME;

    for (level, &index) in va.indices.iter().enumerate() {
        let entry = config.word_address(frame, index);
        let mut next = store.read(entry);
        if next == 0 {
            let allocation = acquire(store, config, va.page, &route);
            let child = allocation.frame();
            trace!("fault at level {level} for page {}: linking frame {child}", va.page);
            // A granted frame may hold a previous owner's data.
            clear_frame(store, config, child);
            store.write(entry, child as Word);
            next = child as Word;
            faults.push(allocation);
        }
        frame = next as FrameIndex;
        route.push(frame);
    }

    store.restore(frame, va.page);
    let address = config.word_address(frame, va.offset);
    let value = match access {
        Access::Read => store.read(address),
        Access::Write(value) => {
            store.write(address, value);
            value
        }
    };
    trace!("{va} -> frame {frame}, {access:?} = {value}");

    Translation {
        value,
        frame,
        route,
        faults,
    }
}
