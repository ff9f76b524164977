//! Long file name reassembly.
//!
//! Long name entries come before the short entry they belong to, highest
//! numbered chunk first. Each chunk carries thirteen UTF-16 units.

use heapless::String;

use crate::fat::ondiskdirentry::LfnChunk;

/// Units in one chunk.
pub const CHUNK_UNITS: usize = 13;
/// A long name has at most 255 characters, which takes 20 chunks.
pub const MAX_CHUNKS: usize = 20;
/// Every UTF-16 unit turns into at most three bytes of UTF-8.
pub const MAX_LFN_UTF8: usize = 255 * 3;

/// A decoded long file name.
pub type LongFileName = String<MAX_LFN_UTF8>;

/// Collects long name chunks until the short entry shows up.
pub struct LfnBuffer {
    units: [u16; MAX_CHUNKS * CHUNK_UNITS],
    /// Set once the highest numbered chunk was seen
    started: bool,
}

impl LfnBuffer {
    pub fn new() -> LfnBuffer {
        LfnBuffer {
            units: [0xFFFF; MAX_CHUNKS * CHUNK_UNITS],
            started: false,
        }
    }

    /// Drop whatever was collected.
    pub fn clear(&mut self) {
        self.units.fill(0xFFFF);
        self.started = false;
    }

    /// Store one chunk at the position its sequence number says.
    ///
    /// The highest numbered chunk starts a new name. Sequence numbers out of
    /// range are ignored.
    pub fn push(&mut self, chunk: &LfnChunk) {
        if chunk.is_last {
            self.clear();
            self.started = true;
        }
        let sequence = usize::from(chunk.sequence);
        if sequence == 0 || sequence > MAX_CHUNKS {
            return;
        }
        let start = (sequence - 1) * CHUNK_UNITS;
        self.units[start..start + CHUNK_UNITS].copy_from_slice(&chunk.units);
    }

    /// The collected name, cut at the first NUL or padding unit.
    ///
    /// Unpaired surrogates become U+FFFD.
    pub fn name(&self) -> Option<LongFileName> {
        if !self.started {
            return None;
        }
        let end = self
            .units
            .iter()
            .position(|&u| u == 0x0000 || u == 0xFFFF)
            .unwrap_or(self.units.len());
        let mut name = LongFileName::new();
        for c in core::char::decode_utf16(self.units[..end].iter().copied()) {
            // Cannot overflow, see MAX_LFN_UTF8.
            let _ = name.push(c.unwrap_or(core::char::REPLACEMENT_CHARACTER));
        }
        Some(name)
    }
}

impl Default for LfnBuffer {
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
