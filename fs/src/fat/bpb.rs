//! Boot Parameter Block

use byteorder::{ByteOrder, LittleEndian};

use crate::{fat::FatType, DeviceError};

const FAT16_TAG: core::ops::Range<usize> = 54..62;
const FAT32_TAG: core::ops::Range<usize> = 82..90;
const FOOTER_START: usize = 510;
const FOOTER_VALUE: u16 = 0xAA55;

/// A Boot Parameter Block, the first block of a FAT partition.
///
/// The type is decided by the file system tag alone, which lives at a
/// different offset for each type. The cluster count is not consulted.
pub struct Bpb<'a> {
    data: &'a [u8],
    pub(crate) fat_type: FatType,
}

impl<'a> Bpb<'a> {
    /// Check and classify a boot sector.
    pub fn create_from_bytes<E: core::fmt::Debug>(data: &'a [u8]) -> Result<Bpb<'a>, DeviceError<E>> {
        if data.len() < FOOTER_START + 2 {
            return Err(DeviceError::FormatError("Boot sector too short"));
        }
        let fat_type = if data[FAT16_TAG].starts_with(b"FAT16") {
            FatType::Fat16
        } else if data[FAT32_TAG].starts_with(b"FAT32") {
            FatType::Fat32
        } else {
            return Err(DeviceError::UnsupportedFormat);
        };
        let bpb = Bpb { data, fat_type };
        if bpb.footer() != FOOTER_VALUE {
            return Err(DeviceError::FormatError("Bad BPB footer"));
        }
        if bpb.bytes_per_block() == 0 {
            return Err(DeviceError::FormatError("Zero bytes per block"));
        }
        if !bpb.blocks_per_cluster().is_power_of_two() {
            return Err(DeviceError::FormatError("Bad blocks per cluster"));
        }
        if bpb.num_fats() == 0 || bpb.fat_size() == 0 {
            return Err(DeviceError::FormatError("No allocation table"));
        }
        if fat_type == FatType::Fat32 && bpb.first_root_dir_cluster() < 2 {
            return Err(DeviceError::FormatError("Bad root cluster"));
        }
        Ok(bpb)
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    define_field!(bytes_per_block, u16, 11);
    define_field!(blocks_per_cluster, u8, 13);
    define_field!(reserved_block_count, u16, 14);
    define_field!(num_fats, u8, 16);
    define_field!(root_entries_count, u16, 17);
    define_field!(total_blocks16, u16, 19);
    define_field!(media, u8, 21);
    define_field!(fat_size16, u16, 22);
    define_field!(total_blocks32, u32, 32);
    define_field!(footer, u16, FOOTER_START);

    // FAT32 only
    define_field!(fat_size32, u32, 36);
    define_field!(first_root_dir_cluster, u32, 44);

    /// Volume label, as stored in the extended boot record.
    pub fn volume_label(&self) -> &[u8] {
        match self.fat_type {
            FatType::Fat16 => &self.data[43..54],
            FatType::Fat32 => &self.data[71..82],
        }
    }

    /// Blocks in one copy of the allocation table. A FAT16 volume only has
    /// the 16-bit field.
    pub fn fat_size(&self) -> u32 {
        let fat_size16 = self.fat_size16();
        match self.fat_type {
            FatType::Fat16 => u32::from(fat_size16),
            FatType::Fat32 if fat_size16 != 0 => u32::from(fat_size16),
            FatType::Fat32 => self.fat_size32(),
        }
    }

    /// Blocks in the whole volume.
    pub fn total_blocks(&self) -> u32 {
        let total_blocks16 = self.total_blocks16();
        if total_blocks16 != 0 {
            u32::from(total_blocks16)
        } else {
            self.total_blocks32()
        }
    }

    /// Blocks taken by the fixed FAT16 root directory. Zero on FAT32.
    pub fn root_dir_blocks(&self) -> u32 {
        let bytes_per_block = u32::from(self.bytes_per_block());
        (u32::from(self.root_entries_count()) * 32 + bytes_per_block - 1) / bytes_per_block
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
