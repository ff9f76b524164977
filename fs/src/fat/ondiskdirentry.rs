//! Directory Entry as stored on-disk

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    fat::{FatType, DIR_ENTRY_LEN},
    filesystem::{attributes::Attributes, cluster::ClusterId, filename::ShortFileName},
};

/// A 32-byte directory entry as stored on-disk in a directory file.
///
/// This is the same for FAT16 and FAT32 (except FAT16 doesn't use
/// first_cluster_hi).
pub struct OnDiskDirEntry<'a> {
    data: &'a [u8],
}

impl<'a> core::fmt::Debug for OnDiskDirEntry<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "OnDiskDirEntry<")?;
        write!(f, "raw_attr = {}", self.raw_attr())?;
        write!(f, ", first_cluster_hi = {}", self.first_cluster_hi())?;
        write!(f, ", first_cluster_lo = {}", self.first_cluster_lo())?;
        write!(f, ", file_size = {}", self.file_size())?;
        write!(f, ", is_end = {}", self.is_end())?;
        write!(f, ", is_valid = {}", self.is_valid())?;
        write!(f, ", is_lfn = {}", self.is_lfn())?;
        write!(f, ">")?;
        Ok(())
    }
}

/// Marks a short entry whose file was deleted.
const DELETED_MARKER: u8 = 0xE5;
/// Set on the ordinal of a long name chunk that was deleted.
const LFN_DELETED: u8 = 0x80;
/// Set on the ordinal of the first stored (highest numbered) long name chunk.
const LFN_LAST_CHUNK: u8 = 0x40;
const LFN_SEQUENCE_MASK: u8 = 0x3F;
/// Where the thirteen UTF-16 units of a long name chunk sit.
const LFN_UNIT_OFFSETS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

/// One long name chunk, pulled out of an LFN entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfnChunk {
    /// Chunk number, starting from 1
    pub sequence: u8,
    /// The entry carries the highest numbered chunk
    pub is_last: bool,
    /// Checksum of the short name this chunk belongs to
    pub checksum: u8,
    pub units: [u16; 13],
}

impl<'a> OnDiskDirEntry<'a> {
    pub(crate) const LEN: usize = DIR_ENTRY_LEN;

    define_field!(raw_attr, u8, 11);
    define_field!(lfn_checksum, u8, 13);
    define_field!(first_cluster_hi, u16, 20);
    define_field!(first_cluster_lo, u16, 26);
    define_field!(file_size, u32, 28);

    /// Create a new on-disk directory entry from a block of 32 bytes read
    /// from a directory file.
    pub fn new(data: &[u8]) -> OnDiskDirEntry<'_> {
        OnDiskDirEntry { data }
    }

    /// Is this the last entry in the directory?
    pub fn is_end(&self) -> bool {
        self.data[0] == 0x00
    }

    /// Is this a valid entry?
    pub fn is_valid(&self) -> bool {
        !self.is_end() && (self.data[0] != DELETED_MARKER)
    }

    /// Is this a Long Filename entry?
    pub fn is_lfn(&self) -> bool {
        self.attributes().is_lfn()
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::create_from_fat(self.raw_attr())
    }

    /// The long name chunk carried by this entry, if it is a live LFN entry.
    pub fn lfn_info(&self) -> Option<LfnChunk> {
        if !self.is_lfn() {
            return None;
        }
        let ordinal = self.data[0];
        if ordinal & LFN_DELETED != 0 {
            return None;
        }
        let mut units = [0u16; 13];
        for (unit, &offset) in units.iter_mut().zip(LFN_UNIT_OFFSETS.iter()) {
            *unit = LittleEndian::read_u16(&self.data[offset..offset + 2]);
        }
        Some(LfnChunk {
            sequence: ordinal & LFN_SEQUENCE_MASK,
            is_last: ordinal & LFN_LAST_CHUNK != 0,
            checksum: self.lfn_checksum(),
            units,
        })
    }

    /// The 8.3 name stored in the first eleven bytes.
    pub fn short_name(&self) -> ShortFileName {
        let mut raw = [0u8; 11];
        raw.copy_from_slice(&self.data[0..11]);
        ShortFileName::from_bytes(&raw)
    }

    /// Which cluster, if any, does this file start at? Assumes this is from
    /// a FAT32 volume.
    pub fn first_cluster_fat32(&self) -> ClusterId {
        let cluster_no =
            (u32::from(self.first_cluster_hi()) << 16) | u32::from(self.first_cluster_lo());
        ClusterId(cluster_no)
    }

    /// Which cluster, if any, does this file start at? FAT16 has no high
    /// half, whatever happens to be stored there is ignored.
    pub fn first_cluster(&self, fat_type: FatType) -> ClusterId {
        match fat_type {
            FatType::Fat16 => ClusterId(u32::from(self.first_cluster_lo())),
            FatType::Fat32 => self.first_cluster_fat32(),
        }
    }

    /// Convert the on-disk format into a DirEntry
    pub fn get_entry(&self, fat_type: FatType) -> DirEntry {
        DirEntry {
            name: self.short_name(),
            attributes: self.attributes(),
            cluster: self.first_cluster(fat_type),
            size: self.file_size(),
        }
    }
}

/// A decoded short directory entry.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The 8.3 name. The long name, if any, is handed out separately.
    pub name: ShortFileName,
    pub attributes: Attributes,
    /// First cluster of the contents. Zero for an empty file or, on a `..`
    /// entry, for the root directory.
    pub cluster: ClusterId,
    /// Size in bytes, zero for directories.
    pub size: u32,
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
