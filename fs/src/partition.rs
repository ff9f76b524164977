//! Master Boot Record partition table.
//!
//! We only support MBR partitioned media, not GUID Partition Tables. Only
//! the four primary entries are read.

use byteorder::{ByteOrder, LittleEndian};

use crate::blockdevice::{BlockCount, BlockIdx};

const PARTITION1_START: usize = 446;
const PARTITION_INFO_LENGTH: usize = 16;
const PARTITION_INFO_STATUS_INDEX: usize = 0;
const PARTITION_INFO_TYPE_INDEX: usize = 4;
const PARTITION_INFO_LBA_START_INDEX: usize = 8;
const PARTITION_INFO_NUM_BLOCKS_INDEX: usize = 12;
const FOOTER_START: usize = 510;
const FOOTER_VALUE: u16 = 0xAA55;

/// Number of primary partitions in an MBR.
pub const MAX_PARTITIONS: usize = 4;

/// Marker for partition type FAT16, and it's stored on the boot partition.
pub const PARTITION_ID_FAT16: u8 = 0x06;
/// Marker for partition type FAT16 with LBA addressing.
pub const PARTITION_ID_FAT16_LBA: u8 = 0x0E;
/// Marker for partition type FAT32 with CHS addressing.
pub const PARTITION_ID_FAT32_CHS_LBA: u8 = 0x0B;
/// Marker for partition type FAT32 with LBA addressing.
pub const PARTITION_ID_FAT32_LBA: u8 = 0x0C;

/// A `VolumeIdx` is a number which identifies a volume (or partition) on a
/// disk.
///
/// `VolumeIdx(0)` is the first primary partition on an MBR partitioned disk.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct VolumeIdx(pub usize);

/// One primary partition entry.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Partition {
    /// 0x80 for bootable, 0x00 otherwise
    pub status: u8,
    /// Partition type byte, see the `PARTITION_ID_*` constants
    pub part_type: u8,
    /// First block of the partition
    pub lba_start: BlockIdx,
    /// Length of the partition
    pub num_blocks: BlockCount,
}

impl Partition {
    /// Does the type byte say FAT16 or FAT32?
    pub fn is_fat(&self) -> bool {
        matches!(
            self.part_type,
            PARTITION_ID_FAT16
                | PARTITION_ID_FAT16_LBA
                | PARTITION_ID_FAT32_CHS_LBA
                | PARTITION_ID_FAT32_LBA
        )
    }

    /// Translate a block number inside the partition into an absolute one.
    ///
    /// Returns `None` when `relative` lies past the end of the partition or
    /// the partition itself starts beyond `capacity`.
    pub fn absolute(&self, relative: BlockIdx, capacity: BlockCount) -> Option<BlockIdx> {
        if self.lba_start.0 > capacity.0 {
            return None;
        }
        if relative.0 >= self.num_blocks.0 {
            return None;
        }
        self.lba_start.checked_add(BlockCount(relative.0))
    }
}

/// Whether the `0x55AA` boot signature sits at the end of the sector.
pub fn has_boot_signature(block: &[u8]) -> bool {
    block.len() >= FOOTER_START + 2
        && LittleEndian::read_u16(&block[FOOTER_START..FOOTER_START + 2]) == FOOTER_VALUE
}

/// Pull the four primary partition entries out of a Master Boot Record.
///
/// No validation happens here beyond the length check.
pub fn parse_partitions(block: &[u8]) -> Option<[Partition; MAX_PARTITIONS]> {
    if block.len() < FOOTER_START + 2 {
        return None;
    }
    let mut partitions = [Partition::default(); MAX_PARTITIONS];
    for (idx, partition) in partitions.iter_mut().enumerate() {
        let start = PARTITION1_START + idx * PARTITION_INFO_LENGTH;
        let entry = &block[start..start + PARTITION_INFO_LENGTH];
        *partition = Partition {
            status: entry[PARTITION_INFO_STATUS_INDEX],
            part_type: entry[PARTITION_INFO_TYPE_INDEX],
            lba_start: BlockIdx(LittleEndian::read_u32(
                &entry[PARTITION_INFO_LBA_START_INDEX..PARTITION_INFO_LBA_START_INDEX + 4],
            )),
            num_blocks: BlockCount(LittleEndian::read_u32(
                &entry[PARTITION_INFO_NUM_BLOCKS_INDEX..PARTITION_INFO_NUM_BLOCKS_INDEX + 4],
            )),
        };
    }
    Some(partitions)
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
