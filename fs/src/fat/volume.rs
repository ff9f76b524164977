//! FAT volume

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    blockdevice::{BlockCount, BlockDevice, BlockIdx},
    cache::{clock::TimeSource, CachedDevice, Pool},
    config::NameMatch,
    debug,
    fat::{
        bpb::Bpb,
        lfn::LfnBuffer,
        ondiskdirentry::{DirEntry, OnDiskDirEntry},
        BlockCache, FatType, FAT16_BAD, FAT16_EOC, FAT32_BAD, FAT32_ENTRY_MASK, FAT32_EOC,
        RESERVED_ENTRIES,
    },
    filesystem::{attributes::Attributes, cluster::ClusterId, filename::split_path},
    partition::VolumeIdx,
    trace, DeviceError,
};

/// The layout of a mounted FAT16 or FAT32 volume.
///
/// All block numbers are relative to the start of the partition.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub struct FatVolume {
    pub(crate) idx: VolumeIdx,
    pub(crate) fat_type: FatType,
    pub(crate) bytes_per_block: u32,
    pub(crate) blocks_per_cluster: u8,
    /// First block of the first allocation table
    pub(crate) fat_start: BlockCount,
    /// First block of the fixed root directory (FAT16)
    pub(crate) first_root_dir_block: BlockCount,
    /// Length of the fixed root directory (FAT16)
    pub(crate) root_dir_blocks: BlockCount,
    /// Block holding cluster 2
    pub(crate) first_data_block: BlockCount,
    /// Start of the root directory chain (FAT32)
    pub(crate) root_cluster: ClusterId,
    /// Number of data clusters on the volume
    pub(crate) cluster_count: u32,
    pub(crate) label: [u8; 11],
}

/// Where a path led.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// The directory holding the entry
    pub parent: ClusterId,
    /// First cluster of the entry
    pub cluster: ClusterId,
    pub attributes: Attributes,
    /// Size in bytes from the directory entry
    pub size: u32,
}

impl Located {
    fn directory(parent: ClusterId, cluster: ClusterId) -> Located {
        Located {
            parent,
            cluster,
            attributes: Attributes::create_from_fat(Attributes::DIRECTORY),
            size: 0,
        }
    }
}

enum Scan<R> {
    Continue,
    End,
    Found(R),
}

impl FatVolume {
    /// Work out the layout from a boot sector.
    pub fn new<E: core::fmt::Debug>(idx: VolumeIdx, bpb: &Bpb) -> Result<FatVolume, DeviceError<E>> {
        let fat_type = bpb.fat_type();
        let blocks_per_cluster = bpb.blocks_per_cluster();
        let fat_start = u32::from(bpb.reserved_block_count());
        let fat_blocks = u32::from(bpb.num_fats())
            .checked_mul(bpb.fat_size())
            .ok_or(DeviceError::FormatError("FAT too large"))?;
        let first_root_dir_block = fat_start
            .checked_add(fat_blocks)
            .ok_or(DeviceError::FormatError("FAT too large"))?;
        let root_dir_blocks = match fat_type {
            FatType::Fat16 => bpb.root_dir_blocks(),
            FatType::Fat32 => 0,
        };
        let first_data_block = first_root_dir_block
            .checked_add(root_dir_blocks)
            .ok_or(DeviceError::FormatError("FAT too large"))?;
        let cluster_count =
            bpb.total_blocks().saturating_sub(first_data_block) / u32::from(blocks_per_cluster);
        let root_cluster = match fat_type {
            FatType::Fat16 => ClusterId::ROOT_DIR,
            FatType::Fat32 => ClusterId(bpb.first_root_dir_cluster()),
        };
        let mut label = [0u8; 11];
        label.copy_from_slice(bpb.volume_label());
        debug!(
            "{:?} volume: {} clusters of {} blocks, data at block {}",
            fat_type,
            cluster_count,
            blocks_per_cluster,
            first_data_block
        );
        Ok(FatVolume {
            idx,
            fat_type,
            bytes_per_block: u32::from(bpb.bytes_per_block()),
            blocks_per_cluster,
            fat_start: BlockCount(fat_start),
            first_root_dir_block: BlockCount(first_root_dir_block),
            root_dir_blocks: BlockCount(root_dir_blocks),
            first_data_block: BlockCount(first_data_block),
            root_cluster,
            cluster_count,
            label,
        })
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    /// Volume label from the boot sector, space padded.
    pub fn label(&self) -> &[u8] {
        &self.label
    }

    /// Bytes in one cluster.
    pub fn bytes_per_cluster(&self) -> u32 {
        u32::from(self.blocks_per_cluster) * self.bytes_per_block
    }

    /// First block of the allocation table.
    pub fn fat_start(&self) -> BlockCount {
        self.fat_start
    }

    /// First block of the root directory. On FAT32 that is the first block
    /// of the root cluster.
    pub fn root_block(&self) -> BlockCount {
        match self.fat_type {
            FatType::Fat16 => self.first_root_dir_block,
            FatType::Fat32 => {
                let first = u32::from(self.blocks_per_cluster)
                    * self.root_cluster.0.saturating_sub(RESERVED_ENTRIES);
                self.first_data_block + BlockCount(first)
            }
        }
    }

    /// Block holding cluster 2.
    pub fn data_start(&self) -> BlockCount {
        self.first_data_block
    }

    /// The first block of a data cluster.
    pub fn cluster_to_block<E: core::fmt::Debug>(
        &self,
        cluster: ClusterId,
    ) -> Result<BlockIdx, DeviceError<E>> {
        let index = self.cluster_index(cluster)?;
        let offset = u32::from(self.blocks_per_cluster) * index;
        Ok(BlockIdx(self.first_data_block.0) + BlockCount(offset))
    }

    fn cluster_index<E: core::fmt::Debug>(&self, cluster: ClusterId) -> Result<u32, DeviceError<E>> {
        match cluster.0.checked_sub(RESERVED_ENTRIES) {
            Some(index) if index < self.cluster_count => Ok(index),
            _ => Err(DeviceError::BadCluster),
        }
    }

    /// Look up the successor of `cluster` in the allocation table.
    ///
    /// `None` means `cluster` is the last one of its chain.
    pub(crate) fn next_cluster<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        cluster: ClusterId,
    ) -> Result<Option<ClusterId>, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        self.cluster_index::<D::E>(cluster)?;
        let fat_offset = cluster.0 * self.fat_type.entry_len();
        let this_fat_block_num = BlockIdx(self.fat_start.0) + BlockCount(fat_offset / self.bytes_per_block);
        let this_fat_ent_offset = (fat_offset % self.bytes_per_block) as usize;
        let block = fat_cache.read(device, Pool::System, self.idx, this_fat_block_num)?;
        let (next, end_of_chain, bad) = match self.fat_type {
            FatType::Fat16 => (
                u32::from(LittleEndian::read_u16(
                    &block[this_fat_ent_offset..this_fat_ent_offset + 2],
                )),
                FAT16_EOC,
                FAT16_BAD,
            ),
            FatType::Fat32 => (
                LittleEndian::read_u32(&block[this_fat_ent_offset..this_fat_ent_offset + 4])
                    & FAT32_ENTRY_MASK,
                FAT32_EOC,
                FAT32_BAD,
            ),
        };
        if next >= end_of_chain {
            trace!("Chain ends at cluster {}", cluster.0);
            return Ok(None);
        }
        if next == bad {
            return Err(DeviceError::BadCluster);
        }
        let next = ClusterId(next);
        // Free or reserved values cannot appear inside a chain.
        self.cluster_index::<D::E>(next)?;
        Ok(Some(next))
    }

    /// Walk the entries of directory `dir` in on-disk order.
    ///
    /// `visit` sees each live short entry together with its display name:
    /// the long name when one precedes the entry, the 8.3 name otherwise.
    /// The walk stops at the first `Some`, which is handed back.
    pub(crate) fn for_each_entry<D, T, F, R, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        dir: ClusterId,
        mut visit: F,
    ) -> Result<Option<R>, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
        F: FnMut(&DirEntry, &str) -> Option<R>,
    {
        let mut lfn = LfnBuffer::new();
        if dir.is_root() && self.fat_type == FatType::Fat16 {
            let first = BlockIdx(self.first_root_dir_block.0);
            for block in 0..self.root_dir_blocks.0 {
                match self.scan_block(device, first + BlockCount(block), &mut lfn, &mut visit)? {
                    Scan::Continue => {}
                    Scan::End => return Ok(None),
                    Scan::Found(found) => return Ok(Some(found)),
                }
            }
            return Ok(None);
        }

        let mut cluster = if dir.is_root() { self.root_cluster } else { dir };
        // A chain cannot be longer than the volume, anything longer loops.
        for _ in 0..self.cluster_count {
            let first = self.cluster_to_block::<D::E>(cluster)?;
            for block in 0..u32::from(self.blocks_per_cluster) {
                match self.scan_block(device, first + BlockCount(block), &mut lfn, &mut visit)? {
                    Scan::Continue => {}
                    Scan::End => return Ok(None),
                    Scan::Found(found) => return Ok(Some(found)),
                }
            }
            cluster = match self.next_cluster(device, fat_cache, cluster)? {
                Some(next) => next,
                None => return Ok(None),
            };
        }
        Err(DeviceError::BadCluster)
    }

    fn scan_block<D, T, F, R, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        block_idx: BlockIdx,
        lfn: &mut LfnBuffer,
        visit: &mut F,
    ) -> Result<Scan<R>, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
        F: FnMut(&DirEntry, &str) -> Option<R>,
    {
        let block = device.fetch_relative(Pool::System, self.idx, block_idx)?;
        for raw in block.chunks_exact(OnDiskDirEntry::LEN) {
            let dir_entry = OnDiskDirEntry::new(raw);
            if dir_entry.is_end() {
                return Ok(Scan::End);
            }
            if dir_entry.is_lfn() {
                if let Some(chunk) = dir_entry.lfn_info() {
                    lfn.push(&chunk);
                }
                continue;
            }
            if !dir_entry.is_valid() || dir_entry.attributes().is_volume() {
                lfn.clear();
                continue;
            }
            let entry = dir_entry.get_entry(self.fat_type);
            let long_name = lfn.name();
            lfn.clear();
            let short_name;
            let name = match long_name.as_ref() {
                Some(long_name) => long_name.as_str(),
                None => {
                    short_name = entry.name.to_name();
                    short_name.as_str()
                }
            };
            if let Some(found) = visit(&entry, name) {
                return Ok(Scan::Found(found));
            }
        }
        Ok(Scan::Continue)
    }

    /// Find the entry called `name` in directory `dir`.
    pub(crate) fn find_directory_entry<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        dir: ClusterId,
        name: &str,
        name_match: NameMatch,
    ) -> Result<DirEntry, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        self.for_each_entry(device, fat_cache, dir, |entry, entry_name| {
            name_match
                .matches(entry_name, name)
                .then(|| entry.clone())
        })?
        .ok_or(DeviceError::NotFound)
    }

    /// Resolve `path` one component at a time, starting in `start` or in
    /// the root when the path begins with a separator.
    pub(crate) fn locate<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        start: ClusterId,
        path: &str,
        name_match: NameMatch,
    ) -> Result<Located, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        let components = split_path(path).map_err(|_| DeviceError::InvalidArgument)?;
        let dir = if components.absolute {
            ClusterId::ROOT_DIR
        } else {
            start
        };
        let mut located = Located::directory(dir, dir);
        for name in components.parts.iter() {
            if !located.attributes.is_directory() {
                return Err(DeviceError::OpenedFileAsDir);
            }
            let entry =
                self.find_directory_entry(device, fat_cache, located.cluster, name, name_match)?;
            located = Located {
                parent: located.cluster,
                cluster: entry.cluster,
                attributes: entry.attributes,
                size: entry.size,
            };
        }
        debug!(
            "Resolved {} to cluster {} in {}",
            path,
            located.cluster.0,
            located.parent.0
        );
        Ok(located)
    }

    /// Size of the entry in `parent` whose first cluster is `child`.
    pub(crate) fn inode_size<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        parent: ClusterId,
        child: ClusterId,
    ) -> Result<u32, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        self.for_each_entry(device, fat_cache, parent, |entry, _| {
            (entry.cluster == child).then_some(entry.size)
        })?
        .ok_or(DeviceError::NotFound)
    }

    /// Copy bytes from the chain starting at `start`, beginning `offset`
    /// bytes in, up to the end of the block that offset falls in.
    ///
    /// `cursor` is the byte offset and cluster reached last time. It is
    /// moved forward along the chain as needed, and rewound to `start` when
    /// `offset` lies behind it. Returns 0 once the chain runs out.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn read_span<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        data_cache: &mut BlockCache<MAX_BLOCK>,
        start: ClusterId,
        cursor: &mut (u32, ClusterId),
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        if offset < cursor.0 {
            *cursor = (0, start);
        }
        let bytes_per_cluster = self.bytes_per_cluster();
        while offset - cursor.0 >= bytes_per_cluster {
            match self.next_cluster(device, fat_cache, cursor.1)? {
                Some(next) => {
                    cursor.1 = next;
                    cursor.0 += bytes_per_cluster;
                }
                None => return Ok(0),
            }
        }
        let offset_in_cluster = offset - cursor.0;
        let block_idx = self.cluster_to_block::<D::E>(cursor.1)?
            + BlockCount(offset_in_cluster / self.bytes_per_block);
        let block_offset = (offset_in_cluster % self.bytes_per_block) as usize;
        let block = data_cache.read(device, Pool::Data, self.idx, block_idx)?;
        let to_copy = buffer.len().min(block.len() - block_offset);
        buffer[..to_copy].copy_from_slice(&block[block_offset..block_offset + to_copy]);
        Ok(to_copy)
    }

    /// Fill `buffer` from the chain starting at `start`, `offset` bytes in.
    ///
    /// Stops early at the end of the chain. An I/O failure after some bytes
    /// arrived ends the read with what was collected so far.
    pub(crate) fn read_file_bytes<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        fat_cache: &mut BlockCache<MAX_BLOCK>,
        data_cache: &mut BlockCache<MAX_BLOCK>,
        start: ClusterId,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        let mut cursor = (0, start);
        let mut read = 0;
        while read < buffer.len() {
            let Some(position) = offset.checked_add(read as u32) else {
                break;
            };
            match self.read_span(
                device,
                fat_cache,
                data_cache,
                start,
                &mut cursor,
                position,
                &mut buffer[read..],
            ) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if read == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(read)
    }

    /// Fill `buffer` from a single cluster, `offset` bytes into it.
    ///
    /// Never reads past the end of the cluster.
    pub(crate) fn read_cluster_bytes<D, T, const SLOTS: usize, const MAX_BLOCK: usize>(
        &self,
        device: &mut CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        data_cache: &mut BlockCache<MAX_BLOCK>,
        cluster: ClusterId,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, DeviceError<D::E>>
    where
        D: BlockDevice,
        T: TimeSource,
    {
        let bytes_per_cluster = self.bytes_per_cluster();
        if offset > bytes_per_cluster {
            return Err(DeviceError::InvalidOffset);
        }
        let first_block = self.cluster_to_block::<D::E>(cluster)?;
        let len = buffer.len().min((bytes_per_cluster - offset) as usize);
        let mut read = 0;
        while read < len {
            let position = offset + read as u32;
            let block_idx = first_block + BlockCount(position / self.bytes_per_block);
            let block_offset = (position % self.bytes_per_block) as usize;
            let block = match data_cache.read(device, Pool::Data, self.idx, block_idx) {
                Ok(block) => block,
                Err(e) if read == 0 => return Err(e),
                Err(_) => break,
            };
            let to_copy = (len - read).min(block.len() - block_offset);
            buffer[read..read + to_copy]
                .copy_from_slice(&block[block_offset..block_offset + to_copy]);
            read += to_copy;
        }
        Ok(read)
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
