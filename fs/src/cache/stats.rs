//! Cache statistics.

use core::fmt;

use super::clock::Timestamp;
use super::pool::BlockPool;

/// Hit and miss counters of one pool.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u32,
    pub misses: u32,
}

impl PoolStats {
    /// Share of lookups served from the cache, 0 to 100. `None` before the
    /// first lookup.
    pub fn hit_percentage(&self) -> Option<u32> {
        let total = u64::from(self.hits) + u64::from(self.misses);
        if total == 0 {
            return None;
        }
        Some((u64::from(self.hits) * 100 / total) as u32)
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub data: PoolStats,
    pub system: PoolStats,
}

impl CacheStats {
    /// Both pools added together.
    pub fn total(&self) -> PoolStats {
        PoolStats {
            hits: self.data.hits.saturating_add(self.system.hits),
            misses: self.data.misses.saturating_add(self.system.misses),
        }
    }
}

/// Human readable dump of one pool.
///
/// Prints the counters, then one line per slot, busiest slots first.
pub struct CacheReport<'a, const SLOTS: usize, const MAX_BLOCK: usize> {
    pool: &'a BlockPool<SLOTS, MAX_BLOCK>,
    now: Timestamp,
}

impl<'a, const SLOTS: usize, const MAX_BLOCK: usize> CacheReport<'a, SLOTS, MAX_BLOCK> {
    pub(crate) fn new(pool: &'a BlockPool<SLOTS, MAX_BLOCK>, now: Timestamp) -> Self {
        CacheReport { pool, now }
    }
}

impl<'a, const SLOTS: usize, const MAX_BLOCK: usize> fmt::Display
    for CacheReport<'a, SLOTS, MAX_BLOCK>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = PoolStats {
            hits: self.pool.hits,
            misses: self.pool.misses,
        };
        writeln!(f, "Cache hits: {}", stats.hits)?;
        writeln!(f, "Cache misses: {}", stats.misses)?;
        match stats.hit_percentage() {
            Some(pct) => writeln!(f, "Cache percent: {}%", pct)?,
            None => writeln!(f, "Cache percent: -")?,
        }
        writeln!(f)?;
        writeln!(f, "ID  Block     Flags  Count  Age")?;

        let max_hit = self
            .pool
            .slot_info()
            .map(|slot| slot.hit_count)
            .max()
            .unwrap_or(0);
        // Walk the distinct hit counts from the top down.
        let mut bound = Some(max_hit);
        while let Some(hit) = bound {
            for slot in self.pool.slot_info().filter(|slot| slot.hit_count == hit) {
                writeln!(
                    f,
                    "{:2}  {:8}  {:02x}     {:5}  {}",
                    slot.index,
                    slot.block_idx.0,
                    slot.flags.0,
                    slot.hit_count,
                    slot.last_access.age(self.now)
                )?;
            }
            bound = self
                .pool
                .slot_info()
                .map(|slot| slot.hit_count)
                .filter(|&count| count < hit)
                .max();
        }
        Ok(())
    }
}
