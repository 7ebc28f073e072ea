/// A single word of physical memory. Table entries and page data share this type.
pub type Word = i32;

/// Index of a frame in the physical pool.
pub type FrameIndex = u64;

/// Virtual page number: the address with its offset bits stripped.
pub type PageNumber = u64;

/// The root table always lives in frame 0; a zero entry therefore doubles as "no child".
pub const ROOT_FRAME: FrameIndex = 0;

pub const OFFSET_WIDTH: u32 = 4;
pub const VIRTUAL_ADDRESS_WIDTH: u32 = 20;
pub const TABLES_DEPTH: u32 = 4;
pub const NUM_FRAMES: u64 = 64;

pub const PAGE_SIZE: u64 = 1 << OFFSET_WIDTH;
pub const VIRTUAL_MEMORY_SIZE: u64 = 1 << VIRTUAL_ADDRESS_WIDTH;
pub const NUM_PAGES: u64 = VIRTUAL_MEMORY_SIZE / PAGE_SIZE;
pub const RAM_SIZE: u64 = NUM_FRAMES * PAGE_SIZE;

// u64 shifts on 2^width need headroom
pub const MAX_ADDRESS_WIDTH: u32 = 62;
