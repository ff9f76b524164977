//! FAT16/FAT32 file system implementation
//!
//! Implements the File Allocation Table file system, read only. Supports
//! FAT16 and FAT32 volumes.

macro_rules! define_field {
    ($name:ident, u8, $offset:expr) => {
        /// Get the value of this field.
        pub fn $name(&self) -> u8 {
            self.data[$offset]
        }
    };
    ($name:ident, u16, $offset:expr) => {
        /// Get the value of this field.
        pub fn $name(&self) -> u16 {
            LittleEndian::read_u16(&self.data[$offset..$offset + 2])
        }
    };
    ($name:ident, u32, $offset:expr) => {
        /// Get the value of this field.
        pub fn $name(&self) -> u32 {
            LittleEndian::read_u32(&self.data[$offset..$offset + 4])
        }
    };
}

/// Number of entries reserved at the start of a File Allocation Table
pub const RESERVED_ENTRIES: u32 = 2;

/// Size of one directory entry, short or long.
pub const DIR_ENTRY_LEN: usize = 32;

/// Cluster values from here on mark the end of a FAT16 chain.
pub const FAT16_EOC: u32 = 0xFFF8;
/// Cluster values from here on mark the end of a FAT32 chain.
pub const FAT32_EOC: u32 = 0x0FFF_FFF8;
/// Bad cluster marker in a FAT16 table.
pub const FAT16_BAD: u32 = 0xFFF7;
/// Bad cluster marker in a FAT32 table.
pub const FAT32_BAD: u32 = 0x0FFF_FFF7;
/// The top nibble of a FAT32 entry is reserved.
pub const FAT32_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// Indentifies the supported types of FAT format
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FatType {
    /// FAT16 Format
    Fat16,
    /// FAT32 Format
    Fat32,
}

impl FatType {
    /// Bytes taken by one entry of the allocation table.
    pub fn entry_len(self) -> u32 {
        match self {
            FatType::Fat16 => 2,
            FatType::Fat32 => 4,
        }
    }
}

/// Remembers the last block fetched through it, so walking a chain or
/// streaming a file does not go back to the cache for every byte.
pub struct BlockCache<const MAX_BLOCK: usize> {
    block: Vec<u8, MAX_BLOCK>,
    idx: Option<BlockIdx>,
}

impl<const MAX_BLOCK: usize> BlockCache<MAX_BLOCK> {
    pub fn empty() -> Self {
        BlockCache {
            block: Vec::new(),
            idx: None,
        }
    }

    /// The remembered block number, if any.
    pub fn idx(&self) -> Option<BlockIdx> {
        self.idx
    }

    /// Forget the remembered block.
    pub fn invalidate(&mut self) {
        self.idx = None;
        self.block.clear();
    }

    /// Read the partition-relative block `relative` of `volume`, through
    /// `pool`, unless it is the block read last time.
    pub(crate) fn read<D, T, const SLOTS: usize>(
        &mut self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        pool: Pool,
        volume: VolumeIdx,
        relative: BlockIdx,
    ) -> Result<&[u8], DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        if Some(relative) != self.idx {
            // Forget first so a failed fetch cannot leave stale contents
            // under the new number.
            self.invalidate();
            let content = device.fetch_relative(pool, volume, relative)?;
            self.block
                .extend_from_slice(content)
                .map_err(|_| DeviceError::BlockSizeTooLarge)?;
            self.idx = Some(relative);
        }
        Ok(&self.block)
    }
}

pub mod bpb;
pub mod fs;
pub mod lfn;
pub mod ondiskdirentry;
pub mod volume;

pub use fs::Fat;

use heapless::Vec;

use crate::{
    blockdevice::{BlockDevice, BlockIdx},
    cache::{clock::TimeSource, CachedDevice, Pool},
    partition::VolumeIdx,
    DeviceError,
};

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
