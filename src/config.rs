//! Memory geometry.
//!
//! A virtual address is split into `tables_depth` table indices followed by an
//! `offset_width`-bit page offset. Every index is `offset_width` bits wide except
//! possibly the most significant one, which takes whatever bits are left over.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmConfig {
    pub offset_width: u32,
    pub virtual_address_width: u32,
    pub tables_depth: u32,
    pub num_frames: u64,
}

impl VmConfig {
    /// Build a config where every table index is exactly `offset_width` bits.
    pub fn with_depth(offset_width: u32, tables_depth: u32, num_frames: u64) -> Self {
        VmConfig {
            offset_width,
            virtual_address_width: offset_width.saturating_mul(tables_depth.saturating_add(1)),
            tables_depth,
            num_frames,
        }
    }

    /// Load a config from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: VmConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Depth implied by the address and offset widths.
    pub fn expected_depth(address_width: u32, offset_width: u32) -> u32 {
        (address_width - offset_width).div_ceil(offset_width)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offset_width == 0 {
            return Err(ConfigError::ZeroOffsetWidth);
        }
        if self.tables_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if self.virtual_address_width > MAX_ADDRESS_WIDTH {
            return Err(ConfigError::AddressTooWide {
                width: self.virtual_address_width,
                max: MAX_ADDRESS_WIDTH,
            });
        }
        if self.virtual_address_width <= self.offset_width {
            return Err(ConfigError::NoPageBits {
                address_width: self.virtual_address_width,
                offset_width: self.offset_width,
            });
        }

        let expected = Self::expected_depth(self.virtual_address_width, self.offset_width);
        if self.tables_depth != expected {
            return Err(ConfigError::DepthMismatch {
                depth: self.tables_depth,
                address_width: self.virtual_address_width,
                offset_width: self.offset_width,
                expected,
            });
        }

        let required = u64::from(self.tables_depth) + 1;
        if self.num_frames < required {
            return Err(ConfigError::TooFewFrames {
                frames: self.num_frames,
                depth: self.tables_depth,
                required,
            });
        }
        // Frame indices are stored inside table words.
        if self.num_frames > Word::MAX as u64
            || self.num_frames.checked_mul(self.page_size()).is_none()
        {
            return Err(ConfigError::TooManyFrames {
                frames: self.num_frames,
            });
        }
        Ok(())
    }

    /// Words per frame (and per page).
    #[inline]
    pub fn page_size(&self) -> u64 {
        1 << self.offset_width
    }

    #[inline]
    pub fn virtual_memory_size(&self) -> u64 {
        1 << self.virtual_address_width
    }

    /// Ring size used for cyclic page distance.
    #[inline]
    pub fn num_pages(&self) -> u64 {
        self.virtual_memory_size() / self.page_size()
    }

    /// Total words of physical memory.
    #[inline]
    pub fn ram_size(&self) -> u64 {
        self.num_frames * self.page_size()
    }

    /// Mask selecting one table index (or the page offset).
    #[inline]
    pub fn index_mask(&self) -> u64 {
        self.page_size() - 1
    }

    /// Absolute word address of entry `index` inside `frame`.
    #[inline]
    pub fn word_address(&self, frame: FrameIndex, index: u64) -> u64 {
        frame * self.page_size() + index
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            offset_width: OFFSET_WIDTH,
            virtual_address_width: VIRTUAL_ADDRESS_WIDTH,
            tables_depth: TABLES_DEPTH,
            num_frames: NUM_FRAMES,
        }
    }
}
