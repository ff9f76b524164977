//! A mounted FAT filesystem.

use crate::{
    blockdevice::{BlockDevice, BlockIdx},
    cache::{clock::TimeSource, CachedDevice, Pool},
    config::Config,
    debug,
    fat::{bpb::Bpb, ondiskdirentry::DirEntry, volume::FatVolume, BlockCache, FatType},
    filesystem::{
        cluster::ClusterId,
        files::{File, FileInfo},
    },
    partition::VolumeIdx,
    DeviceError,
};

/// A FAT16 or FAT32 volume on top of a [`CachedDevice`].
///
/// Directory and allocation table blocks go through the system pool, file
/// contents through the data pool. On top of the cache, the last FAT block
/// and the last data block are remembered, so sequential access rarely
/// goes further down.
pub struct Fat<D, T, const SLOTS: usize = 8, const MAX_BLOCK: usize = 512>
where
    D: BlockDevice,
    T: TimeSource,
{
    device: CachedDevice<D, T, SLOTS, MAX_BLOCK>,
    volume: FatVolume,
    fat_cache: BlockCache<MAX_BLOCK>,
    data_cache: BlockCache<MAX_BLOCK>,
    cwd: ClusterId,
    config: Config,
}

impl<D, T, const SLOTS: usize, const MAX_BLOCK: usize> Fat<D, T, SLOTS, MAX_BLOCK>
where
    D: BlockDevice,
    T: TimeSource,
{
    /// Mount partition `volume` with the default [`Config`].
    pub fn mount(
        device: CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        volume: VolumeIdx,
    ) -> Result<Self, DeviceError<D::E>> {
        Self::mount_with_config(device, volume, Config::default())
    }

    /// Mount partition `volume`.
    ///
    /// The medium is initialised first if that has not happened yet. Fails
    /// with [`DeviceError::UnsupportedFormat`] when the boot sector carries
    /// neither the FAT16 nor the FAT32 tag.
    pub fn mount_with_config(
        mut device: CachedDevice<D, T, SLOTS, MAX_BLOCK>,
        volume: VolumeIdx,
        config: Config,
    ) -> Result<Self, DeviceError<D::E>> {
        if device.block_len() == 0 {
            device.initialize()?;
        }
        let partition = device
            .partition(volume)
            .map_err(|_| DeviceError::NoSuchVolume)?;
        if partition.num_blocks.0 == 0 {
            return Err(DeviceError::NoSuchVolume);
        }
        device.set_cache_mode(config.cache_mode)?;
        let block_len = device.block_len();
        let fat_volume = {
            let boot = device.fetch_relative(Pool::System, volume, BlockIdx(0))?;
            let bpb = Bpb::create_from_bytes(boot)?;
            if usize::from(bpb.bytes_per_block()) != block_len {
                return Err(DeviceError::FormatError("Block size differs from medium"));
            }
            FatVolume::new(volume, &bpb)?
        };
        debug!("Mounted volume {}", volume.0);
        Ok(Fat {
            device,
            volume: fat_volume,
            fat_cache: BlockCache::empty(),
            data_cache: BlockCache::empty(),
            cwd: ClusterId::ROOT_DIR,
            config,
        })
    }

    pub fn fat_type(&self) -> FatType {
        self.volume.fat_type()
    }

    /// The volume layout.
    pub fn volume(&self) -> &FatVolume {
        &self.volume
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bytes in one cluster.
    pub fn cluster_size(&self) -> u32 {
        self.volume.bytes_per_cluster()
    }

    /// Open the file at `path` for reading.
    ///
    /// Relative paths start in the current directory.
    pub fn open(&mut self, path: &str) -> Result<File<'_, D, T, SLOTS, MAX_BLOCK>, DeviceError<D::E>> {
        let info = self.open_info(path)?;
        Ok(File::new(info, self))
    }

    pub(crate) fn open_info(&mut self, path: &str) -> Result<FileInfo, DeviceError<D::E>> {
        let located = self.volume.locate(
            &mut self.device,
            &mut self.fat_cache,
            self.cwd,
            path,
            self.config.name_match,
        )?;
        if located.attributes.is_directory() {
            return Err(DeviceError::OpenedDirAsFile);
        }
        Ok(FileInfo::new(located.parent, located.cluster, located.size))
    }

    /// The directory relative paths start from.
    pub fn cwd(&self) -> ClusterId {
        self.cwd
    }

    /// Make `path` the current directory.
    pub fn change_dir(&mut self, path: &str) -> Result<(), DeviceError<D::E>> {
        let located = self.volume.locate(
            &mut self.device,
            &mut self.fat_cache,
            self.cwd,
            path,
            self.config.name_match,
        )?;
        if !located.attributes.is_directory() {
            return Err(DeviceError::OpenedFileAsDir);
        }
        self.cwd = located.cluster;
        Ok(())
    }

    /// Resolve `path` inside directory `parent` to the first cluster of the
    /// entry it names.
    ///
    /// `ancestor` is set to the directory holding that entry.
    pub fn get_inode(
        &mut self,
        parent: ClusterId,
        path: &str,
        ancestor: &mut ClusterId,
    ) -> Result<ClusterId, DeviceError<D::E>> {
        let located = self.volume.locate(
            &mut self.device,
            &mut self.fat_cache,
            parent,
            path,
            self.config.name_match,
        )?;
        *ancestor = located.parent;
        Ok(located.cluster)
    }

    /// The cluster following `cluster`, or `None` at the end of its chain.
    pub fn next_cluster(&mut self, cluster: ClusterId) -> Result<Option<ClusterId>, DeviceError<D::E>> {
        self.volume
            .next_cluster(&mut self.device, &mut self.fat_cache, cluster)
    }

    /// Size recorded for `child` in directory `parent`.
    pub fn inode_size(&mut self, parent: ClusterId, child: ClusterId) -> Result<u32, DeviceError<D::E>> {
        self.volume
            .inode_size(&mut self.device, &mut self.fat_cache, parent, child)
    }

    /// Call `func` for each entry of the directory at `path`, with the name
    /// it is found by.
    pub fn iterate_dir<F>(&mut self, path: &str, mut func: F) -> Result<(), DeviceError<D::E>>
    where
        F: FnMut(&DirEntry, &str),
    {
        let located = self.volume.locate(
            &mut self.device,
            &mut self.fat_cache,
            self.cwd,
            path,
            self.config.name_match,
        )?;
        if !located.attributes.is_directory() {
            return Err(DeviceError::OpenedFileAsDir);
        }
        self.volume.for_each_entry(
            &mut self.device,
            &mut self.fat_cache,
            located.cluster,
            |entry, name| -> Option<()> {
                func(entry, name);
                None
            },
        )?;
        Ok(())
    }

    /// Read from the chain starting at `start`, `offset` bytes into it.
    pub fn read_file_bytes(
        &mut self,
        start: ClusterId,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, DeviceError<D::E>> {
        self.volume.read_file_bytes(
            &mut self.device,
            &mut self.fat_cache,
            &mut self.data_cache,
            start,
            offset,
            buffer,
        )
    }

    /// Read from `cluster` alone, `offset` bytes into it.
    pub fn read_cluster_bytes(
        &mut self,
        cluster: ClusterId,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, DeviceError<D::E>> {
        self.volume
            .read_cluster_bytes(&mut self.device, &mut self.data_cache, cluster, offset, buffer)
    }

    /// One byte of the chain starting at `start`.
    pub fn read_file_byte(&mut self, start: ClusterId, offset: u32) -> Result<u8, DeviceError<D::E>> {
        let mut byte = [0u8];
        match self.read_file_bytes(start, offset, &mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(DeviceError::InvalidOffset),
        }
    }

    /// One byte of `cluster`.
    pub fn read_cluster_byte(&mut self, cluster: ClusterId, offset: u32) -> Result<u8, DeviceError<D::E>> {
        let mut byte = [0u8];
        match self.read_cluster_bytes(cluster, offset, &mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(DeviceError::InvalidOffset),
        }
    }

    /// Streaming read used by open files; `cursor` carries the position in
    /// the chain between calls.
    pub(crate) fn read_at(
        &mut self,
        start: ClusterId,
        cursor: &mut (u32, ClusterId),
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, DeviceError<D::E>> {
        self.volume.read_span(
            &mut self.device,
            &mut self.fat_cache,
            &mut self.data_cache,
            start,
            cursor,
            offset,
            buffer,
        )
    }

    /// Write every pending block to the medium.
    pub fn sync(&mut self) -> Result<(), DeviceError<D::E>> {
        self.device.sync()
    }

    /// The cache underneath, for statistics.
    pub fn cache(&self) -> &CachedDevice<D, T, SLOTS, MAX_BLOCK> {
        &self.device
    }

    /// Mutable access to the cache underneath.
    ///
    /// Anything may change through it, so the remembered blocks are dropped.
    pub fn cache_mut(&mut self) -> &mut CachedDevice<D, T, SLOTS, MAX_BLOCK> {
        self.fat_cache.invalidate();
        self.data_cache.invalidate();
        &mut self.device
    }

    /// Sync and hand back the cache.
    pub fn unmount(mut self) -> Result<CachedDevice<D, T, SLOTS, MAX_BLOCK>, DeviceError<D::E>> {
        self.device.sync()?;
        Ok(self.device)
    }

    /// Hand back the cache without syncing.
    pub fn free(self) -> CachedDevice<D, T, SLOTS, MAX_BLOCK> {
        self.device
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
