use std::collections::HashMap;

use log::debug;

use crate::config::VmConfig;
use crate::constants::*;

/// Word-addressed physical memory plus the swap traffic the translator needs.
///
/// The translation engine only ever talks to memory through this trait, so it
/// can run against [`PhysicalMemory`] or any other backing implementation.
pub trait FrameStore {
    /// Read the word at absolute address `address`.
    fn read(&self, address: u64) -> Word;

    /// Write the word at absolute address `address`.
    fn write(&mut self, address: u64, value: Word);

    /// Bring `page` into `frame` from backing storage.
    ///
    /// Must be a no-op when there is nothing stored for `page`, which also
    /// makes a second restore of an already resident page harmless.
    fn restore(&mut self, frame: FrameIndex, page: PageNumber);

    /// Persist the contents of `frame` as `page` before the frame is reused.
    fn evict(&mut self, frame: FrameIndex, page: PageNumber);
}

/// Counters kept by [`PhysicalMemory`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub word_writes: u64,
    pub evictions: u64,
    pub restores: u64,
}

/// Paging disk: swapped-out pages, addressed by page number since frames are
/// reassigned between pages over time.
#[derive(Debug, Default)]
pub struct Disk {
    pages: HashMap<PageNumber, Box<[Word]>>,
}

impl Disk {
    pub fn new() -> Self {
        Disk::default()
    }

    pub fn contains(&self, page: PageNumber) -> bool {
        self.pages.contains_key(&page)
    }

    /// Number of pages currently swapped out.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Store a page. Writing the same page twice means it was evicted without
    /// being restored in between, which breaks the one-copy rule.
    pub fn store(&mut self, page: PageNumber, data: Box<[Word]>) {
        let previous = self.pages.insert(page, data);
        assert!(
            previous.is_none(),
            "page {page} evicted while a swapped copy already exists"
        );
    }

    /// Remove and return a stored page.
    pub fn take(&mut self, page: PageNumber) -> Option<Box<[Word]>> {
        self.pages.remove(&page)
    }

    /// Read one word of a swapped page without loading it.
    pub fn peek(&self, page: PageNumber, offset: usize) -> Option<Word> {
        self.pages.get(&page).and_then(|data| data.get(offset).copied())
    }
}

/// In-memory frame pool backed by a [`Disk`].
pub struct PhysicalMemory {
    data: Vec<Word>,
    page_size: usize,
    disk: Disk,
    stats: StoreStats,
}

impl PhysicalMemory {
    /// Create a zeroed frame pool sized for `config`.
    pub fn new(config: &VmConfig) -> Self {
        PhysicalMemory {
            data: vec![0; config.ram_size() as usize],
            page_size: config.page_size() as usize,
            disk: Disk::new(),
            stats: StoreStats::default(),
        }
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(&self, frame: FrameIndex) -> usize {
        frame as usize * self.page_size
    }

    /// The words held by one frame.
    pub fn frame(&self, frame: FrameIndex) -> &[Word] {
        let start = self.frame_to_address(frame);
        &self.data[start..start + self.page_size]
    }

    pub fn num_frames(&self) -> u64 {
        (self.data.len() / self.page_size) as u64
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

impl FrameStore for PhysicalMemory {
    #[inline]
    fn read(&self, address: u64) -> Word {
        self.data[address as usize]
    }

    #[inline]
    fn write(&mut self, address: u64, value: Word) {
        self.stats.word_writes += 1;
        self.data[address as usize] = value;
    }

    fn restore(&mut self, frame: FrameIndex, page: PageNumber) {
        let Some(saved) = self.disk.take(page) else {
            return;
        };
        debug!("restore page {page} into frame {frame}");
        let start = self.frame_to_address(frame);
        self.data[start..start + self.page_size].copy_from_slice(&saved);
        self.stats.restores += 1;
    }

    fn evict(&mut self, frame: FrameIndex, page: PageNumber) {
        debug!("evict page {page} from frame {frame}");
        let saved: Box<[Word]> = self.frame(frame).into();
        self.disk.store(page, saved);
        self.stats.evictions += 1;
    }
}
