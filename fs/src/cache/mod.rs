//! The block cache.
//!
//! [`CachedDevice`] wraps a [`BlockDevice`] and keeps two independent pools of
//! recently used blocks. The [`Pool::Data`] pool holds file contents, the
//! [`Pool::System`] pool holds boot sectors, FAT sectors and directories, so
//! streaming through a large file never pushes the filesystem structures
//! out.
//!
//! Writes land in the cache and reach the medium later (write-back, the
//! default) or immediately (write-through). Anything still dirty when the
//! power goes is lost in write-back mode; call [`CachedDevice::sync`] when it
//! matters.

pub mod clock;
pub mod pool;
pub mod stats;

use crate::blockdevice::{BlockCount, BlockDevice, BlockIdx};
use crate::partition::{self, Partition, VolumeIdx, MAX_PARTITIONS};
use crate::{debug, DeviceError};

use clock::TimeSource;
use pool::{BlockPool, SlotInfo};
use stats::{CacheReport, CacheStats, PoolStats};

/// Which pool a block belongs in.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pool {
    /// File contents
    Data,
    /// Boot sector, partition table, FAT and directory blocks
    System,
}

/// When cached writes reach the medium.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Only on eviction or [`CachedDevice::sync`]. Fast and easy on flash,
    /// but an ejected card or a power cut loses pending writes.
    #[default]
    WriteBack,
    /// As part of every write call.
    WriteThrough,
}

/// A block device with a two-pool cache in front of it.
///
/// `SLOTS` is the number of blocks per pool and `MAX_BLOCK` the largest block
/// length the medium may report.
pub struct CachedDevice<D, T, const SLOTS: usize = 8, const MAX_BLOCK: usize = 512>
where
    D: BlockDevice,
    T: TimeSource,
{
    device: D,
    time_source: T,
    data: BlockPool<SLOTS, MAX_BLOCK>,
    system: BlockPool<SLOTS, MAX_BLOCK>,
    mode: CacheMode,
    partitions: [Partition; MAX_PARTITIONS],
    block_len: usize,
    capacity: BlockCount,
}

impl<D, T, const SLOTS: usize, const MAX_BLOCK: usize> CachedDevice<D, T, SLOTS, MAX_BLOCK>
where
    D: BlockDevice,
    T: TimeSource,
{
    /// Wrap a medium. Nothing is read until [`CachedDevice::initialize`].
    pub fn new(device: D, time_source: T) -> Self {
        CachedDevice {
            device,
            time_source,
            data: BlockPool::new(),
            system: BlockPool::new(),
            mode: CacheMode::default(),
            partitions: [Partition::default(); MAX_PARTITIONS],
            block_len: 0,
            capacity: BlockCount(0),
        }
    }

    /// Bring the medium up and load its partition table.
    pub fn initialize(&mut self) -> Result<(), DeviceError<D::E>> {
        self.device.initialize().map_err(DeviceError::DeviceError)?;
        self.attach()
    }

    /// Re-attach removable media and reload its partition table.
    pub fn insert(&mut self) -> Result<(), DeviceError<D::E>> {
        self.device.insert().map_err(DeviceError::DeviceError)?;
        self.attach()
    }

    /// Flush everything, forget everything and let the medium go.
    ///
    /// The medium is ejected even if the flush fails; the flush error is
    /// returned in that case.
    pub fn eject(&mut self) -> Result<(), DeviceError<D::E>> {
        let synced = if self.block_len == 0 { Ok(()) } else { self.sync() };
        self.data.invalidate_all();
        self.system.invalidate_all();
        self.partitions = [Partition::default(); MAX_PARTITIONS];
        self.block_len = 0;
        self.device.eject().map_err(DeviceError::DeviceError)?;
        synced
    }

    fn attach(&mut self) -> Result<(), DeviceError<D::E>> {
        let block_len = self.device.block_len();
        if block_len == 0 {
            return Err(DeviceError::NotInitialized);
        }
        if block_len > MAX_BLOCK {
            return Err(DeviceError::BlockSizeTooLarge);
        }
        self.data.invalidate_all();
        self.system.invalidate_all();
        self.block_len = block_len;
        self.capacity = self.device.num_blocks();
        debug!(
            "Medium attached: {} blocks of {} bytes",
            self.capacity.0,
            block_len
        );
        self.load_partition_table()
    }

    /// Read block 0 through the system pool and keep its four partition
    /// entries.
    ///
    /// Only a sanity check is done: the signature must be there and the
    /// first partition must start on the medium.
    pub fn load_partition_table(&mut self) -> Result<(), DeviceError<D::E>> {
        let partitions = {
            let block = self.fetch(Pool::System, BlockIdx(0))?;
            if !partition::has_boot_signature(block) {
                return Err(DeviceError::FormatError("Invalid MBR signature"));
            }
            partition::parse_partitions(block)
                .ok_or(DeviceError::FormatError("Short MBR"))?
        };
        if partitions[0].lba_start.0 > self.capacity.0 {
            return Err(DeviceError::NoSuchDevice);
        }
        self.partitions = partitions;
        Ok(())
    }

    fn pool_mut(&mut self, pool: Pool) -> &mut BlockPool<SLOTS, MAX_BLOCK> {
        match pool {
            Pool::Data => &mut self.data,
            Pool::System => &mut self.system,
        }
    }

    fn pool(&self, pool: Pool) -> &BlockPool<SLOTS, MAX_BLOCK> {
        match pool {
            Pool::Data => &self.data,
            Pool::System => &self.system,
        }
    }

    fn check_block(&self, block_idx: BlockIdx) -> Result<(), DeviceError<D::E>> {
        if self.block_len == 0 {
            return Err(DeviceError::NotInitialized);
        }
        if block_idx.0 >= self.capacity.0 {
            return Err(DeviceError::InvalidArgument);
        }
        Ok(())
    }

    /// Borrow the cached bytes of an absolute block, loading it on a miss.
    pub fn fetch(&mut self, pool: Pool, block_idx: BlockIdx) -> Result<&[u8], DeviceError<D::E>> {
        self.check_block(block_idx)?;
        let now = self.time_source.get_timestamp();
        let block_len = self.block_len;
        let (pool, device) = match pool {
            Pool::Data => (&mut self.data, &mut self.device),
            Pool::System => (&mut self.system, &mut self.device),
        };
        pool.read(device, block_idx, block_len, now)
    }

    /// Copy an absolute block out of the cache into `data`.
    pub fn read(
        &mut self,
        pool: Pool,
        block_idx: BlockIdx,
        data: &mut [u8],
    ) -> Result<(), DeviceError<D::E>> {
        self.check_block(block_idx)?;
        if data.len() != self.block_len {
            return Err(DeviceError::InvalidArgument);
        }
        let block = self.fetch(pool, block_idx)?;
        data.copy_from_slice(block);
        Ok(())
    }

    /// Put `data` into the cache as the new contents of an absolute block.
    pub fn write(
        &mut self,
        pool: Pool,
        block_idx: BlockIdx,
        data: &[u8],
    ) -> Result<(), DeviceError<D::E>> {
        self.check_block(block_idx)?;
        if data.len() != self.block_len {
            return Err(DeviceError::InvalidArgument);
        }
        let now = self.time_source.get_timestamp();
        let mode = self.mode;
        let (pool, device) = match pool {
            Pool::Data => (&mut self.data, &mut self.device),
            Pool::System => (&mut self.system, &mut self.device),
        };
        pool.write(device, block_idx, data, mode, now)
    }

    pub fn read_data(&mut self, block_idx: BlockIdx, data: &mut [u8]) -> Result<(), DeviceError<D::E>> {
        self.read(Pool::Data, block_idx, data)
    }

    pub fn write_data(&mut self, block_idx: BlockIdx, data: &[u8]) -> Result<(), DeviceError<D::E>> {
        self.write(Pool::Data, block_idx, data)
    }

    pub fn read_system(
        &mut self,
        block_idx: BlockIdx,
        data: &mut [u8],
    ) -> Result<(), DeviceError<D::E>> {
        self.read(Pool::System, block_idx, data)
    }

    pub fn write_system(&mut self, block_idx: BlockIdx, data: &[u8]) -> Result<(), DeviceError<D::E>> {
        self.write(Pool::System, block_idx, data)
    }

    /// The partition table entry for `volume`.
    pub fn partition(&self, volume: VolumeIdx) -> Result<Partition, DeviceError<D::E>> {
        self.partitions
            .get(volume.0)
            .copied()
            .ok_or(DeviceError::InvalidArgument)
    }

    /// Turn a block number inside a partition into an absolute one.
    pub fn relative_to_absolute(
        &self,
        volume: VolumeIdx,
        relative: BlockIdx,
    ) -> Result<BlockIdx, DeviceError<D::E>> {
        self.partition(volume)?
            .absolute(relative, self.capacity)
            .ok_or(DeviceError::InvalidArgument)
    }

    /// [`CachedDevice::fetch`] with a partition-relative block number.
    pub fn fetch_relative(
        &mut self,
        pool: Pool,
        volume: VolumeIdx,
        relative: BlockIdx,
    ) -> Result<&[u8], DeviceError<D::E>> {
        let block_idx = self.relative_to_absolute(volume, relative)?;
        self.fetch(pool, block_idx)
    }

    pub fn read_relative(
        &mut self,
        pool: Pool,
        volume: VolumeIdx,
        relative: BlockIdx,
        data: &mut [u8],
    ) -> Result<(), DeviceError<D::E>> {
        let block_idx = self.relative_to_absolute(volume, relative)?;
        self.read(pool, block_idx, data)
    }

    pub fn write_relative(
        &mut self,
        pool: Pool,
        volume: VolumeIdx,
        relative: BlockIdx,
        data: &[u8],
    ) -> Result<(), DeviceError<D::E>> {
        let block_idx = self.relative_to_absolute(volume, relative)?;
        self.write(pool, block_idx, data)
    }

    /// Write every dirty block in both pools to the medium.
    ///
    /// Every dirty block gets its chance even if an earlier one fails. The
    /// first failure is returned.
    pub fn sync(&mut self) -> Result<(), DeviceError<D::E>> {
        let data = self.data.flush_all(&mut self.device);
        let system = self.system.flush_all(&mut self.device);
        data.and(system)
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.mode
    }

    /// Switch cache mode. Going write-through flushes whatever is pending.
    pub fn set_cache_mode(&mut self, mode: CacheMode) -> Result<(), DeviceError<D::E>> {
        self.mode = mode;
        if mode == CacheMode::WriteThrough && self.block_len != 0 {
            return self.sync();
        }
        Ok(())
    }

    /// Length of one block, zero before the medium is initialised.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn num_blocks(&self) -> BlockCount {
        self.capacity
    }

    /// Hit and miss counters of both pools.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            data: PoolStats {
                hits: self.data.hits,
                misses: self.data.misses,
            },
            system: PoolStats {
                hits: self.system.hits,
                misses: self.system.misses,
            },
        }
    }

    /// Look inside the slots of one pool.
    pub fn slots(&self, pool: Pool) -> impl Iterator<Item = SlotInfo> + '_ {
        self.pool(pool).slot_info()
    }

    /// A printable summary of one pool, for debug consoles.
    pub fn report(&self, pool: Pool) -> CacheReport<'_, SLOTS, MAX_BLOCK> {
        CacheReport::new(
            self.pool(pool),
            self.time_source.get_timestamp(),
        )
    }

    /// Number of slots in `pool` holding `block_idx`.
    pub fn residency(&self, pool: Pool, block_idx: BlockIdx) -> usize {
        self.pool(pool).residency(block_idx)
    }

    /// `Some(dirty)` if `block_idx` is resident in `pool`.
    pub fn is_dirty(&self, pool: Pool, block_idx: BlockIdx) -> Option<bool> {
        self.pool(pool).is_dirty(block_idx)
    }

    /// Temporarily get access to the underlying block device.
    pub fn device(&mut self) -> &mut D {
        &mut self.device
    }

    /// Look at the underlying block device.
    pub fn medium(&self) -> &D {
        &self.device
    }

    /// Drop every cached block without writing anything back.
    pub fn discard(&mut self) {
        self.pool_mut(Pool::Data).invalidate_all();
        self.pool_mut(Pool::System).invalidate_all();
    }

    /// Consume the cache and hand back the medium and clock.
    ///
    /// Pending writes are not flushed, call [`CachedDevice::sync`] first.
    pub fn free(self) -> (D, T) {
        (self.device, self.time_source)
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
