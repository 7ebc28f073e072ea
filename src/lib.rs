pub mod allocator;
pub mod config;
pub mod constants;
pub mod error;
pub mod eviction;
pub mod io;
pub mod memory;
pub mod translation;
pub mod tree;
pub mod vm_manager;

// Re-export commonly used items for convenience
pub use config::VmConfig;
pub use constants::*;
pub use error::{ConfigError, TraceError, VmError};
pub use memory::{FrameStore, PhysicalMemory};
pub use translation::{Access, VirtualAddress};
pub use vm_manager::{VmManager, VmStats};
