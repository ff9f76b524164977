//! A fixed-size pool of cached blocks.
//!
//! Slots live in a flat array and are found by linear scan. With a handful
//! of slots that beats anything cleverer.

use heapless::Vec;

use super::clock::Timestamp;
use super::CacheMode;
use crate::blockdevice::{BlockDevice, BlockIdx};
use crate::{trace, warn, DeviceError};

/// State bits of a cache slot.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SlotFlags(pub u8);

impl SlotFlags {
    /// Nothing cached here
    pub const EMPTY: Self = Self(0x00);
    /// The slot holds the contents of `block_idx`
    pub const VALID: Self = Self(0x01);
    /// The slot holds bytes the medium has not seen yet
    pub const DIRTY: Self = Self(0x02);

    pub fn is_valid(self) -> bool {
        self.0 & Self::VALID.0 != 0
    }

    pub fn is_dirty(self) -> bool {
        self.0 & Self::DIRTY.0 != 0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// One cached block.
#[derive(Debug)]
pub struct CacheSlot<const MAX_BLOCK: usize> {
    block_idx: BlockIdx,
    last_access: Timestamp,
    hit_count: u32,
    flags: SlotFlags,
    data: Vec<u8, MAX_BLOCK>,
}

impl<const MAX_BLOCK: usize> CacheSlot<MAX_BLOCK> {
    fn empty() -> Self {
        CacheSlot {
            block_idx: BlockIdx(0),
            last_access: Timestamp::default(),
            hit_count: 0,
            flags: SlotFlags::EMPTY,
            data: Vec::new(),
        }
    }

    fn holds(&self, block_idx: BlockIdx) -> bool {
        self.flags.is_valid() && self.block_idx == block_idx
    }

    fn touch(&mut self, now: Timestamp) {
        self.last_access = now;
        self.hit_count = self.hit_count.saturating_add(1);
    }

    fn claim(&mut self, block_idx: BlockIdx, flags: SlotFlags, now: Timestamp) {
        self.block_idx = block_idx;
        self.flags = flags;
        self.hit_count = 0;
        self.last_access = now;
    }

    /// Push the slot out to the medium if it is dirty.
    fn flush<D: BlockDevice>(&mut self, device: &mut D) -> Result<(), DeviceError<D::E>> {
        if self.flags.is_valid() && self.flags.is_dirty() {
            device
                .write_block(self.block_idx, &self.data)
                .map_err(DeviceError::DeviceError)?;
            self.flags.remove(SlotFlags::DIRTY);
        }
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A read-only view of one slot, for statistics and diagnostics.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub index: usize,
    pub block_idx: BlockIdx,
    pub flags: SlotFlags,
    pub hit_count: u32,
    pub last_access: Timestamp,
}

/// A pool of `SLOTS` cached blocks, each up to `MAX_BLOCK` bytes long.
#[derive(Debug)]
pub struct BlockPool<const SLOTS: usize, const MAX_BLOCK: usize> {
    slots: [CacheSlot<MAX_BLOCK>; SLOTS],
    pub(crate) hits: u32,
    pub(crate) misses: u32,
}

impl<const SLOTS: usize, const MAX_BLOCK: usize> BlockPool<SLOTS, MAX_BLOCK> {
    const HAS_SLOTS: () = assert!(SLOTS > 0, "a cache pool needs at least one slot");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::HAS_SLOTS;
        BlockPool {
            slots: core::array::from_fn(|_| CacheSlot::empty()),
            hits: 0,
            misses: 0,
        }
    }

    fn find(&self, block_idx: BlockIdx) -> Option<usize> {
        self.slots.iter().position(|slot| slot.holds(block_idx))
    }

    fn find_empty(&self) -> Option<usize> {
        self.slots.iter().position(|slot| !slot.flags.is_valid())
    }

    /// Pick the slot to throw out when the pool is full.
    ///
    /// Lowest hit count wins. Among those, the one untouched for the longest.
    /// Remaining ties go to the lowest index.
    pub fn find_expirable_entry(&self) -> usize {
        let least_used = self
            .slots
            .iter()
            .map(|slot| slot.hit_count)
            .min()
            .unwrap_or(0);

        let mut oldest: Option<usize> = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.hit_count != least_used {
                continue;
            }
            match oldest {
                Some(o) if self.slots[o].last_access <= slot.last_access => {}
                _ => oldest = Some(idx),
            }
        }
        oldest.unwrap_or(0)
    }

    /// Find a home for `block_idx`: an empty slot, or else an evicted one.
    ///
    /// A dirty victim is written back first. If that write fails the data is
    /// dropped and the caller carries on; the new block matters more.
    fn make_room<D: BlockDevice>(&mut self, device: &mut D) -> usize {
        if let Some(idx) = self.find_empty() {
            return idx;
        }
        let idx = self.find_expirable_entry();
        let victim = &mut self.slots[idx];
        trace!(
            "Evicting slot {} (block {}, {} hits)",
            idx,
            victim.block_idx.0,
            victim.hit_count
        );
        if let Err(_e) = victim.flush(device) {
            warn!("Lost dirty block {} on eviction", victim.block_idx.0);
        }
        victim.flags = SlotFlags::EMPTY;
        idx
    }

    /// Make sure `block_idx` is resident and return its bytes.
    pub fn read<D: BlockDevice>(
        &mut self,
        device: &mut D,
        block_idx: BlockIdx,
        block_len: usize,
        now: Timestamp,
    ) -> Result<&[u8], DeviceError<D::E>> {
        if let Some(idx) = self.find(block_idx) {
            self.hits = self.hits.saturating_add(1);
            let slot = &mut self.slots[idx];
            slot.touch(now);
            return Ok(&slot.data);
        }

        self.misses = self.misses.saturating_add(1);
        trace!("Cache miss on block {}", block_idx.0);
        let idx = self.make_room(device);
        let slot = &mut self.slots[idx];
        slot.data
            .resize(block_len, 0)
            .map_err(|_| DeviceError::BlockSizeTooLarge)?;
        // The slot stays empty until the fetch has succeeded.
        device
            .read_block(block_idx, &mut slot.data)
            .map_err(DeviceError::DeviceError)?;
        slot.claim(block_idx, SlotFlags::VALID, now);
        Ok(&slot.data)
    }

    /// Replace the cached contents of `block_idx` with `data`.
    pub fn write<D: BlockDevice>(
        &mut self,
        device: &mut D,
        block_idx: BlockIdx,
        data: &[u8],
        mode: CacheMode,
        now: Timestamp,
    ) -> Result<(), DeviceError<D::E>> {
        let idx = match self.find(block_idx) {
            Some(idx) => {
                self.hits = self.hits.saturating_add(1);
                self.slots[idx].touch(now);
                idx
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                let idx = self.make_room(device);
                self.slots[idx].claim(block_idx, SlotFlags::EMPTY, now);
                idx
            }
        };

        let slot = &mut self.slots[idx];
        slot.data.clear();
        if slot.data.extend_from_slice(data).is_err() {
            slot.flags = SlotFlags::EMPTY;
            return Err(DeviceError::BlockSizeTooLarge);
        }
        slot.flags = SlotFlags::VALID;
        slot.flags.insert(SlotFlags::DIRTY);

        if mode == CacheMode::WriteThrough {
            slot.flush(device)?;
        }
        Ok(())
    }

    /// Write back every dirty slot.
    ///
    /// Keeps going after a failure and reports the first one.
    pub fn flush_all<D: BlockDevice>(&mut self, device: &mut D) -> Result<(), DeviceError<D::E>> {
        let mut result = Ok(());
        for slot in self.slots.iter_mut() {
            if let Err(e) = slot.flush(device) {
                warn!("Failed to flush block {}", slot.block_idx.0);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Forget everything. Dirty data is lost, so flush first.
    pub fn invalidate_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.flags = SlotFlags::EMPTY;
            slot.hit_count = 0;
        }
    }

    pub fn slot_info(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        self.slots.iter().enumerate().map(|(index, slot)| SlotInfo {
            index,
            block_idx: slot.block_idx,
            flags: slot.flags,
            hit_count: slot.hit_count,
            last_access: slot.last_access,
        })
    }

    /// How many slots currently hold `block_idx`. Never more than one.
    pub fn residency(&self, block_idx: BlockIdx) -> usize {
        self.slots.iter().filter(|slot| slot.holds(block_idx)).count()
    }

    pub fn is_dirty(&self, block_idx: BlockIdx) -> Option<bool> {
        self.find(block_idx)
            .map(|idx| self.slots[idx].flags.is_dirty())
    }
}

impl<const SLOTS: usize, const MAX_BLOCK: usize> Default for BlockPool<SLOTS, MAX_BLOCK> {
    fn default() -> Self {
        Self::new()
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
