//! Block Device support
//!
//! Generic code for handling block devices, such as types for identifying
//! a particular block on a block device by its index.

/// The linear numeric address of a block (or sector).
///
/// The first block on a disk gets `BlockIdx(0)` (which usually contains the
/// Master Boot Record).
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIdx(pub u32);

/// The a number of blocks (or sectors).
///
/// Add this to a `BlockIdx` to get an actual address on disk.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockCount(pub u32);

/// The storage medium underneath the cache.
///
/// This is what a transport driver (SD card over SPI, SPI NOR flash, a file
/// on the host) implements. The cache only ever moves whole blocks of
/// [`BlockDevice::block_len`] bytes, one at a time.
pub trait BlockDevice {
    /// The errors that the `BlockDevice` can return. Must be debug formattable.
    type E: core::fmt::Debug;
    /// Bring the medium up. Called once before any other access.
    fn initialize(&mut self) -> Result<(), Self::E>;
    /// Detach removable media.
    fn eject(&mut self) -> Result<(), Self::E>;
    /// Re-attach removable media after an eject.
    fn insert(&mut self) -> Result<(), Self::E>;
    /// Determine how many blocks this device can hold.
    fn num_blocks(&self) -> BlockCount;
    /// Length in bytes of one block. Only valid after `initialize`.
    fn block_len(&self) -> usize;
    /// Read a single block into `data`, which is exactly `block_len` long.
    fn read_block(&mut self, block_idx: BlockIdx, data: &mut [u8]) -> Result<(), Self::E>;
    /// Write a single block from `data`, which is exactly `block_len` long.
    fn write_block(&mut self, block_idx: BlockIdx, data: &[u8]) -> Result<(), Self::E>;
}

impl BlockIdx {
    /// Convert a block index into a 64-bit byte offset from the start of the
    /// volume.
    pub fn into_bytes(self, block_len: usize) -> u64 {
        u64::from(self.0) * block_len as u64
    }

    /// Checked offset inside a region starting at `self`.
    pub fn checked_add(self, rhs: BlockCount) -> Option<BlockIdx> {
        self.0.checked_add(rhs.0).map(BlockIdx)
    }
}

impl core::ops::Add<BlockCount> for BlockIdx {
    type Output = BlockIdx;
    fn add(self, rhs: BlockCount) -> BlockIdx {
        BlockIdx(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign<BlockCount> for BlockIdx {
    fn add_assign(&mut self, rhs: BlockCount) {
        self.0 += rhs.0
    }
}

impl core::ops::Add<BlockCount> for BlockCount {
    type Output = BlockCount;
    fn add(self, rhs: BlockCount) -> BlockCount {
        BlockCount(self.0 + rhs.0)
    }
}

impl core::ops::Sub<BlockIdx> for BlockIdx {
    type Output = BlockCount;
    fn sub(self, rhs: BlockIdx) -> BlockCount {
        BlockCount(self.0 - rhs.0)
    }
}

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
