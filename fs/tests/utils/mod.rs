//! Useful library code for tests

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use sdstore::{
    cache::clock::SequenceClock, BlockCount, BlockDevice, BlockIdx, CachedDevice, FatType,
};

/// Every fixture uses the classic sector length.
pub const BLOCK_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The block lies past the end of the disk
    OutOfRange(BlockIdx),
    /// A failure asked for by the test
    Injected(BlockIdx),
}

/// A disk in memory that remembers every block it was asked for.
#[derive(Debug, Clone)]
pub struct RamDisk {
    pub contents: Vec<u8>,
    pub block_len: usize,
    /// Block numbers read, in order
    pub reads: Vec<u32>,
    /// Block numbers and bytes written, in order
    pub writes: Vec<(u32, Vec<u8>)>,
    pub fail_reads: BTreeSet<u32>,
    pub fail_writes: BTreeSet<u32>,
    pub ejected: bool,
}

impl RamDisk {
    pub fn new(contents: Vec<u8>) -> RamDisk {
        RamDisk::with_block_len(contents, BLOCK_LEN)
    }

    pub fn with_block_len(contents: Vec<u8>, block_len: usize) -> RamDisk {
        RamDisk {
            contents,
            block_len,
            reads: Vec::new(),
            writes: Vec::new(),
            fail_reads: BTreeSet::new(),
            fail_writes: BTreeSet::new(),
            ejected: false,
        }
    }

    /// A blank disk of `blocks` blocks with a single partition starting at
    /// `start` and running to the end.
    pub fn partitioned(blocks: u32, start: u32) -> RamDisk {
        let mut contents = vec![0u8; blocks as usize * BLOCK_LEN];
        write_mbr(&mut contents, &[(0x0C, start, blocks - start)]);
        RamDisk::new(contents)
    }

    /// The current contents of one block.
    pub fn block(&self, idx: u32) -> &[u8] {
        let start = idx as usize * self.block_len;
        &self.contents[start..start + self.block_len]
    }

    /// How often `idx` was read from the medium.
    pub fn reads_of(&self, idx: u32) -> usize {
        self.reads.iter().filter(|&&r| r == idx).count()
    }

    pub fn clear_journal(&mut self) {
        self.reads.clear();
        self.writes.clear();
    }
}

impl BlockDevice for RamDisk {
    type E = Error;

    fn initialize(&mut self) -> Result<(), Error> {
        self.ejected = false;
        Ok(())
    }

    fn eject(&mut self) -> Result<(), Error> {
        self.ejected = true;
        Ok(())
    }

    fn insert(&mut self) -> Result<(), Error> {
        self.ejected = false;
        Ok(())
    }

    fn num_blocks(&self) -> BlockCount {
        BlockCount((self.contents.len() / self.block_len) as u32)
    }

    fn block_len(&self) -> usize {
        self.block_len
    }

    fn read_block(&mut self, block_idx: BlockIdx, data: &mut [u8]) -> Result<(), Error> {
        if self.fail_reads.contains(&block_idx.0) {
            return Err(Error::Injected(block_idx));
        }
        let start = block_idx.0 as usize * self.block_len;
        let block = self
            .contents
            .get(start..start + self.block_len)
            .ok_or(Error::OutOfRange(block_idx))?;
        data.copy_from_slice(block);
        self.reads.push(block_idx.0);
        Ok(())
    }

    fn write_block(&mut self, block_idx: BlockIdx, data: &[u8]) -> Result<(), Error> {
        if self.fail_writes.contains(&block_idx.0) {
            return Err(Error::Injected(block_idx));
        }
        let start = block_idx.0 as usize * self.block_len;
        let block = self
            .contents
            .get_mut(start..start + self.block_len)
            .ok_or(Error::OutOfRange(block_idx))?;
        block.copy_from_slice(data);
        self.writes.push((block_idx.0, data.to_vec()));
        Ok(())
    }
}

/// Fill in a Master Boot Record: `(type, start, length)` per partition.
pub fn write_mbr(disk: &mut [u8], partitions: &[(u8, u32, u32)]) {
    for (i, &(part_type, start, len)) in partitions.iter().enumerate() {
        let entry = 446 + i * 16;
        disk[entry + 4] = part_type;
        disk[entry + 8..entry + 12].copy_from_slice(&start.to_le_bytes());
        disk[entry + 12..entry + 16].copy_from_slice(&len.to_le_bytes());
    }
    disk[510] = 0x55;
    disk[511] = 0xAA;
}

/// A cache with eight slots per pool over `disk`, initialised.
pub fn make_cache(disk: RamDisk) -> CachedDevice<RamDisk, SequenceClock> {
    let mut cache = CachedDevice::new(disk, SequenceClock::new());
    cache.initialize().expect("initialize");
    cache
}

/// Builds small FAT16 and FAT32 volumes in memory.
///
/// One FAT copy per `num_fats`, one block per cluster unless changed. The
/// volume sits behind a one-entry MBR.
pub struct FatImage {
    pub fat_type: FatType,
    /// First block of the partition
    pub partition_start: u32,
    pub total_blocks: u32,
    pub reserved_blocks: u32,
    pub num_fats: u32,
    pub fat_size: u32,
    pub root_entries: u32,
    pub blocks_per_cluster: u32,
    pub root_cluster: u32,
    volume: Vec<u8>,
    /// Next free entry slot per directory cluster (0 is the FAT16 root)
    dir_fill: BTreeMap<u32, usize>,
}

pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_VOLUME: u8 = 0x08;
pub const ATTR_LFN: u8 = 0x0F;

impl FatImage {
    /// 256 blocks, reserved block, two FATs of one block, 32 root entries.
    pub fn fat16() -> FatImage {
        let mut image = FatImage::new(FatType::Fat16, 256, 1, 2, 1, 32, 0);
        image.set_fat(0, 0xFFF8);
        image.set_fat(1, 0xFFFF);
        image
    }

    /// 256 blocks, four reserved blocks, two FATs of two blocks, root
    /// directory at cluster 2.
    pub fn fat32() -> FatImage {
        let mut image = FatImage::new(FatType::Fat32, 256, 4, 2, 2, 0, 2);
        image.set_fat(0, 0x0FFF_FFF8);
        image.set_fat(1, 0x0FFF_FFFF);
        image.set_fat(2, 0x0FFF_FFFF);
        image
    }

    fn new(
        fat_type: FatType,
        total_blocks: u32,
        reserved_blocks: u32,
        num_fats: u32,
        fat_size: u32,
        root_entries: u32,
        root_cluster: u32,
    ) -> FatImage {
        FatImage {
            fat_type,
            partition_start: 8,
            total_blocks,
            reserved_blocks,
            num_fats,
            fat_size,
            root_entries,
            blocks_per_cluster: 1,
            root_cluster,
            volume: vec![0u8; total_blocks as usize * BLOCK_LEN],
            dir_fill: BTreeMap::new(),
        }
    }

    pub fn root_block(&self) -> u32 {
        self.reserved_blocks + self.num_fats * self.fat_size
    }

    pub fn data_start(&self) -> u32 {
        self.root_block() + self.root_entries * 32 / BLOCK_LEN as u32
    }

    /// Partition-relative first block of `cluster`.
    pub fn cluster_block(&self, cluster: u32) -> u32 {
        self.data_start() + (cluster - 2) * self.blocks_per_cluster
    }

    /// Absolute block number of the first block of `cluster`.
    pub fn cluster_block_abs(&self, cluster: u32) -> u32 {
        self.partition_start + self.cluster_block(cluster)
    }

    pub fn cluster_len(&self) -> usize {
        self.blocks_per_cluster as usize * BLOCK_LEN
    }

    /// Set the allocation table entry of `cluster` in every copy.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        let width = match self.fat_type {
            FatType::Fat16 => 2,
            FatType::Fat32 => 4,
        };
        for copy in 0..self.num_fats {
            let fat = (self.reserved_blocks + copy * self.fat_size) as usize * BLOCK_LEN;
            let at = fat + cluster as usize * width;
            let bytes = value.to_le_bytes();
            self.volume[at..at + width].copy_from_slice(&bytes[..width]);
        }
    }

    fn end_of_chain(&self) -> u32 {
        match self.fat_type {
            FatType::Fat16 => 0xFFFF,
            FatType::Fat32 => 0x0FFF_FFFF,
        }
    }

    /// Link `clusters` into a chain and fill them with `data`.
    pub fn write_chain(&mut self, clusters: &[u32], data: &[u8]) {
        for (i, &cluster) in clusters.iter().enumerate() {
            let next = clusters.get(i + 1).copied().unwrap_or(self.end_of_chain());
            self.set_fat(cluster, next);
        }
        let cluster_len = self.cluster_len();
        for (chunk, &cluster) in data.chunks(cluster_len).zip(clusters.iter()) {
            let at = self.cluster_block(cluster) as usize * BLOCK_LEN;
            self.volume[at..at + chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Byte offset of the next free entry in directory `dir`. Follows the
    /// directory's chain in the FAT, so extend it with `write_chain` first
    /// when it needs more than one cluster.
    fn next_entry(&mut self, dir: u32) -> usize {
        let slot = *self.dir_fill.get(&dir).unwrap_or(&0);
        self.dir_fill.insert(dir, slot + 1);
        if dir == 0 && self.fat_type == FatType::Fat16 {
            assert!((slot as u32) < self.root_entries, "root directory full");
            return self.root_block() as usize * BLOCK_LEN + slot * 32;
        }
        let per_cluster = self.cluster_len() / 32;
        let mut cluster = if dir == 0 { self.root_cluster } else { dir };
        for _ in 0..slot / per_cluster {
            cluster = self.fat_entry(cluster);
        }
        self.cluster_block(cluster) as usize * BLOCK_LEN + (slot % per_cluster) * 32
    }

    fn fat_entry(&self, cluster: u32) -> u32 {
        let at = self.reserved_blocks as usize * BLOCK_LEN;
        match self.fat_type {
            FatType::Fat16 => {
                let at = at + cluster as usize * 2;
                u32::from(u16::from_le_bytes([self.volume[at], self.volume[at + 1]]))
            }
            FatType::Fat32 => {
                let at = at + cluster as usize * 4;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&self.volume[at..at + 4]);
                u32::from_le_bytes(bytes)
            }
        }
    }

    /// Append a raw 32-byte entry to directory `dir`.
    pub fn add_raw_entry(&mut self, dir: u32, entry: [u8; 32]) {
        let at = self.next_entry(dir);
        self.volume[at..at + 32].copy_from_slice(&entry);
    }

    /// Append a short entry.
    pub fn add_entry(&mut self, dir: u32, name: &[u8; 11], attr: u8, cluster: u32, size: u32) {
        self.add_raw_entry(dir, short_entry(name, attr, cluster, size));
    }

    /// A file in `dir` whose contents start at `cluster` and run through
    /// consecutive clusters.
    pub fn add_file(&mut self, dir: u32, name: &[u8; 11], cluster: u32, data: &[u8]) {
        let clusters = self.consecutive(cluster, data.len());
        self.add_file_in(dir, name, &clusters, data);
    }

    /// A file in `dir` spread over `clusters`, in that order.
    pub fn add_file_in(&mut self, dir: u32, name: &[u8; 11], clusters: &[u32], data: &[u8]) {
        let first = if data.is_empty() { 0 } else { clusters[0] };
        if !data.is_empty() {
            self.write_chain(clusters, data);
        }
        self.add_entry(dir, name, ATTR_ARCHIVE, first, data.len() as u32);
    }

    /// A file with a long name, preceded by its LFN entries.
    pub fn add_long_file(&mut self, dir: u32, long: &str, short: &[u8; 11], cluster: u32, data: &[u8]) {
        for entry in lfn_entries(long, short) {
            self.add_raw_entry(dir, entry);
        }
        self.add_file(dir, short, cluster, data);
    }

    /// A subdirectory at `cluster` with its `.` and `..` entries.
    pub fn add_dir(&mut self, dir: u32, name: &[u8; 11], cluster: u32) {
        self.add_entry(dir, name, ATTR_DIRECTORY, cluster, 0);
        let eoc = self.end_of_chain();
        self.set_fat(cluster, eoc);
        // A `..` pointing at the root stores 0.
        let parent = if dir == self.root_cluster { 0 } else { dir };
        self.add_entry(cluster, b".          ", ATTR_DIRECTORY, cluster, 0);
        self.add_entry(cluster, b"..         ", ATTR_DIRECTORY, parent, 0);
    }

    fn consecutive(&self, cluster: u32, len: usize) -> Vec<u32> {
        let count = len.div_ceil(self.cluster_len()).max(1);
        (cluster..cluster + count as u32).collect()
    }

    fn boot_sector(&self) -> [u8; BLOCK_LEN] {
        let mut boot = [0u8; BLOCK_LEN];
        boot[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        boot[3..11].copy_from_slice(b"SDSTORE ");
        boot[11..13].copy_from_slice(&(BLOCK_LEN as u16).to_le_bytes());
        boot[13] = self.blocks_per_cluster as u8;
        boot[14..16].copy_from_slice(&(self.reserved_blocks as u16).to_le_bytes());
        boot[16] = self.num_fats as u8;
        boot[17..19].copy_from_slice(&(self.root_entries as u16).to_le_bytes());
        boot[21] = 0xF8;
        boot[32..36].copy_from_slice(&self.total_blocks.to_le_bytes());
        match self.fat_type {
            FatType::Fat16 => {
                boot[22..24].copy_from_slice(&(self.fat_size as u16).to_le_bytes());
                boot[38] = 0x29;
                boot[43..54].copy_from_slice(b"TESTVOL16  ");
                boot[54..62].copy_from_slice(b"FAT16   ");
            }
            FatType::Fat32 => {
                boot[36..40].copy_from_slice(&self.fat_size.to_le_bytes());
                boot[44..48].copy_from_slice(&self.root_cluster.to_le_bytes());
                boot[66] = 0x29;
                boot[71..82].copy_from_slice(b"TESTVOL32  ");
                boot[82..90].copy_from_slice(b"FAT32   ");
            }
        }
        boot[510] = 0x55;
        boot[511] = 0xAA;
        boot
    }

    /// The whole disk: MBR, gap, then the volume.
    pub fn build(&self) -> Vec<u8> {
        let start = self.partition_start as usize * BLOCK_LEN;
        let mut disk = vec![0u8; start + self.volume.len()];
        let part_type = match self.fat_type {
            FatType::Fat16 => 0x06,
            FatType::Fat32 => 0x0C,
        };
        write_mbr(&mut disk, &[(part_type, self.partition_start, self.total_blocks)]);
        disk[start..].copy_from_slice(&self.volume);
        disk[start..start + BLOCK_LEN].copy_from_slice(&self.boot_sector());
        disk
    }

    pub fn into_disk(self) -> RamDisk {
        RamDisk::new(self.build())
    }
}

/// A 32-byte short directory entry.
pub fn short_entry(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut entry = [0u8; 32];
    entry[0..11].copy_from_slice(name);
    entry[11] = attr;
    entry[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    entry[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    entry[28..32].copy_from_slice(&size.to_le_bytes());
    entry
}

/// The LFN entries for `long`, in on-disk order (highest chunk first).
pub fn lfn_entries(long: &str, short: &[u8; 11]) -> Vec<[u8; 32]> {
    const OFFSETS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    let checksum = short
        .iter()
        .fold(0u8, |sum, &b| (sum >> 1 | sum << 7).wrapping_add(b));
    let mut units: Vec<u16> = long.encode_utf16().collect();
    if units.len() % 13 != 0 {
        units.push(0x0000);
    }
    while units.len() % 13 != 0 {
        units.push(0xFFFF);
    }
    let chunks = units.len() / 13;
    let mut entries = Vec::new();
    for seq in (1..=chunks).rev() {
        let mut entry = [0u8; 32];
        entry[0] = seq as u8 | if seq == chunks { 0x40 } else { 0 };
        entry[11] = ATTR_LFN;
        entry[13] = checksum;
        for (i, &offset) in OFFSETS.iter().enumerate() {
            let unit = units[(seq - 1) * 13 + i];
            entry[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
        }
        entries.push(entry);
    }
    entries
}

/// Bytes `0, 1, 2, ...` wrapping, handy for checking offsets.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
