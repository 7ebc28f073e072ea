use log::{debug, info};
use serde::Serialize;

use crate::allocator::Allocation;
use crate::config::VmConfig;
use crate::constants::*;
use crate::error::{ConfigError, VmError};
use crate::memory::{FrameStore, PhysicalMemory};
use crate::translation::{Access, Translation, VirtualAddress, clear_frame, translate};
use crate::tree::{MappedPage, PageTree};

/// Counters for the accesses served so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VmStats {
    pub reads: u64,
    pub writes: u64,
    pub rejected: u64,
    pub page_faults: u64,
    pub tables_reused: u64,
    pub frames_allocated: u64,
    pub evictions: u64,
}

impl VmStats {
    fn record(&mut self, translation: &Translation) {
        self.page_faults += translation.faults.len() as u64;
        for fault in &translation.faults {
            match fault {
                Allocation::ReusedTable(_) => self.tables_reused += 1,
                Allocation::Unused(_) => self.frames_allocated += 1,
                Allocation::Evicted { .. } => self.evictions += 1,
            }
        }
    }
}

/// A single virtual address space on top of a [`FrameStore`].
pub struct VmManager<S: FrameStore = PhysicalMemory> {
    config: VmConfig,
    store: S,
    stats: VmStats,
}

impl VmManager<PhysicalMemory> {
    /// Create a manager over a fresh in-memory frame pool.
    pub fn new(config: VmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = PhysicalMemory::new(&config);
        Self::with_store(config, store)
    }
}

impl<S: FrameStore> VmManager<S> {
    /// Create a manager over an existing store. The root table is cleared.
    pub fn with_store(config: VmConfig, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut vm = VmManager {
            config,
            store,
            stats: VmStats::default(),
        };
        vm.initialize();
        Ok(vm)
    }

    /// Zero the root table, unmapping every page.
    pub fn initialize(&mut self) {
        clear_frame(&mut self.store, &self.config, ROOT_FRAME);
        info!(
            "initialized: {} frames of {} words, depth {}, {} pages",
            self.config.num_frames,
            self.config.page_size(),
            self.config.tables_depth,
            self.config.num_pages()
        );
    }

    pub fn read(&mut self, va: u64) -> Result<Word, VmError> {
        self.access(va, Access::Read)
    }

    pub fn write(&mut self, va: u64, value: Word) -> Result<(), VmError> {
        self.access(va, Access::Write(value)).map(|_| ())
    }

    fn access(&mut self, va: u64, access: Access) -> Result<Word, VmError> {
        let limit = self.config.virtual_memory_size();
        if va >= limit {
            debug!("rejecting {access:?} at {va}: outside {limit}-word address space");
            self.stats.rejected += 1;
            return Err(VmError::AddressOutOfRange { address: va, limit });
        }

        let address = VirtualAddress::decompose(va, &self.config);
        let translation = translate(&mut self.store, &self.config, &address, access);
        match access {
            Access::Read => self.stats.reads += 1,
            Access::Write(_) => self.stats.writes += 1,
        }
        self.stats.record(&translation);

        #[cfg(debug_assertions)]
        self.check_invariants();

        Ok(translation.value)
    }

    /// Panics if the tree is not a consistent, duplicate-free mapping.
    pub fn check_invariants(&self) {
        PageTree::new(&self.store, &self.config).check_invariants();
    }

    /// Pages currently resident, in tree order.
    pub fn mapped_pages(&self) -> Vec<MappedPage> {
        PageTree::new(&self.store, &self.config).leaves()
    }

    pub fn stats(&self) -> VmStats {
        self.stats
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn vm(offset_width: u32, depth: u32, frames: u64) -> VmManager {
        VmManager::new(VmConfig::with_depth(offset_width, depth, frames)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(VmManager::new(VmConfig::with_depth(2, 2, 2)).is_err());
    }

    #[test]
    fn test_write_then_read() {
        let mut vm = VmManager::new(VmConfig::default()).unwrap();
        vm.write(13, 3).unwrap();
        assert_eq!(vm.read(13), Ok(3));
        assert_eq!(vm.read(14), Ok(0));
    }

    #[test]
    fn test_boundary_has_no_side_effects() {
        let mut vm = vm(2, 2, 4);
        let before = vm.store().frame(0).to_vec();
        let limit = vm.config().virtual_memory_size();

        assert_eq!(
            vm.write(limit, 1),
            Err(VmError::AddressOutOfRange { address: limit, limit })
        );
        assert!(vm.read(limit).is_err());
        assert!(vm.read(u64::MAX).is_err());

        assert_eq!(vm.store().frame(0), &before[..]);
        assert!(vm.mapped_pages().is_empty());
        assert_eq!(vm.stats().rejected, 3);
        assert_eq!(vm.stats().page_faults, 0);
    }

    #[test]
    fn test_last_address_is_valid() {
        let mut vm = vm(2, 2, 4);
        let last = vm.config().virtual_memory_size() - 1;
        vm.write(last, 77).unwrap();
        assert_eq!(vm.read(last), Ok(77));
    }

    #[test]
    fn test_four_pages_in_four_frames() {
        // Root plus three frames: every page after the first forces eviction.
        let mut vm = vm(2, 2, 4);
        let pages = [0u64, 5, 10, 15];
        for (i, &page) in pages.iter().enumerate() {
            vm.write(page << 2, 100 + i as Word).unwrap();
        }
        assert_eq!(vm.stats().evictions, 3);
        assert_eq!(vm.mapped_pages(), vec![MappedPage { page: 15, frame: 2 }]);

        for (i, &page) in pages.iter().enumerate() {
            assert_eq!(vm.read(page << 2), Ok(100 + i as Word));
        }
    }

    #[test]
    fn test_empty_tables_reclaimed_before_eviction() {
        let mut vm = vm(2, 2, 4);
        vm.write(0, 1).unwrap();
        vm.write(5 << 2, 2).unwrap();
        // Page 0 was evicted, leaving its table empty; page 10 takes that table.
        let stats = vm.stats();
        vm.write(10 << 2, 3).unwrap();
        let after = vm.stats();
        assert_eq!(after.tables_reused - stats.tables_reused, 1);
        assert_eq!(after.evictions - stats.evictions, 1);
        assert_eq!(after.frames_allocated, stats.frames_allocated);
    }

    #[test]
    fn test_data_survives_many_evictions() {
        let mut vm = vm(2, 3, 5);
        let size = vm.config().virtual_memory_size();
        for round in 0..3 {
            for va in (0..size).step_by(7) {
                vm.write(va, (va as Word) * 10 + round).unwrap();
            }
        }
        for va in (0..size).step_by(7) {
            assert_eq!(vm.read(va), Ok((va as Word) * 10 + 2), "va {va}");
        }
        assert!(vm.stats().evictions > 0);
        assert!(!vm.store().disk().is_empty());
    }

    #[test]
    fn test_initialize_unmaps_everything() {
        let mut vm = vm(2, 2, 8);
        vm.write(3, 9).unwrap();
        assert_eq!(vm.mapped_pages().len(), 1);
        vm.initialize();
        assert!(vm.mapped_pages().is_empty());
    }

    #[test]
    fn test_stats_count_accesses() {
        let mut vm = vm(2, 2, 8);
        vm.write(0, 1).unwrap();
        vm.read(0).unwrap();
        vm.read(1).unwrap();
        let stats = vm.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.page_faults, 2);
        assert_eq!(stats.frames_allocated, 2);
    }

    #[test]
    fn test_with_custom_store() {
        let config = VmConfig::with_depth(2, 2, 4);
        let mut store = PhysicalMemory::new(&config);
        store.write(1, 3); // stale root entry
        let mut vm = VmManager::with_store(config, store).unwrap();
        assert!(vm.mapped_pages().is_empty());
        vm.write(1, 4).unwrap();
        assert_eq!(vm.into_store().frame(2)[1], 4);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Read(u64),
        Write(u64, Word),
    }

    fn ops(size: u64) -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![
                (0..size).prop_map(Op::Read),
                (0..size, any::<Word>()).prop_map(|(va, v)| Op::Write(va, v)),
            ],
            1..200,
        )
    }

    fn check_against_model(mut vm: VmManager, ops: Vec<Op>) -> Result<(), TestCaseError> {
        let mut model: HashMap<u64, Word> = HashMap::new();
        for op in ops {
            match op {
                Op::Write(va, value) => {
                    prop_assert!(vm.write(va, value).is_ok());
                    model.insert(va, value);
                }
                Op::Read(va) => {
                    let expected = model.get(&va).copied().unwrap_or(0);
                    prop_assert_eq!(vm.read(va), Ok(expected));
                }
            }
            vm.check_invariants();
        }
        for (va, value) in model {
            prop_assert_eq!(vm.read(va), Ok(value));
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip_minimal_pool(ops in ops(1 << 6)) {
            check_against_model(vm(2, 2, 4), ops)?;
        }

        #[test]
        fn prop_round_trip_deep_tree(ops in ops(1 << 8)) {
            check_against_model(vm(2, 3, 6), ops)?;
        }

        #[test]
        fn prop_round_trip_binary_tree(ops in ops(1 << 6)) {
            check_against_model(vm(1, 5, 9), ops)?;
        }
    }
}
