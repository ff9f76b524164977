//! # sdstore
//!
//! Layered storage access for constrained devices.
//!
//! A [`cache::CachedDevice`] sits on top of any [`blockdevice::BlockDevice`]
//! (an SD card behind SPI, a NOR flash, a RAM disk) and keeps two small pools
//! of cached blocks: one for file contents and one for filesystem structures.
//! On top of that, [`fat::Fat`] interprets a FAT16 or FAT32 partition and
//! hands out read cursors ([`filesystem::files::File`]) for named files.
//!
//! ```ignore
//! let mut device = CachedDevice::new(sd_card, SequenceClock::new());
//! device.initialize()?;
//! let mut fat = Fat::mount(device, VolumeIdx(0))?;
//! let mut file = fat.open("LOGS/BOOT.TXT")?;
//! let mut buffer = [0u8; 64];
//! let n = file.read_bytes(&mut buffer)?;
//! ```
//!
//! Everything runs synchronously on the caller's thread. Nothing in here
//! guards against concurrent callers.

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "defmt-log", feature = "log"))]
compile_error!("Cannot enable both log and defmt-log");

// Modules reach the logging macros by path, so they come first.
pub mod blockdevice;
pub mod cache;
pub mod config;
pub mod fat;
pub mod filesystem;
pub mod partition;

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::debug! but does nothing at all
macro_rules! debug {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::trace! but does nothing at all
macro_rules! trace {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::warn! but does nothing at all
macro_rules! warn {
    ($($arg:tt)+) => {};
}

pub use crate::blockdevice::{BlockCount, BlockDevice, BlockIdx};
pub use crate::cache::{CacheMode, CachedDevice, Pool};
pub use crate::config::{Config, NameMatch};
pub use crate::fat::{Fat, FatType};
pub use crate::filesystem::files::File;
pub use crate::partition::VolumeIdx;

/// The classic sector length. Devices may report something else.
pub const BLOCK_LEN: u32 = 512;

/// Represents all the ways the functions in this crate can fail.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError<E>
where
    E: core::fmt::Debug,
{
    /// The medium driver returned an error
    DeviceError(E),
    /// A partition index, block number or buffer length was out of range
    InvalidArgument,
    /// A path component could not be found in its directory
    NotFound,
    /// The boot sector is neither FAT16 nor FAT32
    UnsupportedFormat,
    /// The partition table does not describe this medium
    NoSuchDevice,
    /// The given volume index is not one of the four primary partitions
    NoSuchVolume,
    /// Some on-disk structure did not look right
    FormatError(&'static str),
    /// The medium reports a block length larger than a cache slot can hold
    BlockSizeTooLarge,
    /// A cluster chain points at a free, reserved or bad cluster
    BadCluster,
    /// Tried to open a directory as a file
    OpenedDirAsFile,
    /// Tried to descend into a file as if it were a directory
    OpenedFileAsDir,
    /// Tried to seek outside the file
    InvalidOffset,
    /// The cache was used before the medium was initialised
    NotInitialized,
}

impl<E> From<E> for DeviceError<E>
where
    E: core::fmt::Debug,
{
    fn from(value: E) -> DeviceError<E> {
        DeviceError::DeviceError(value)
    }
}

impl<E> core::fmt::Display for DeviceError<E>
where
    E: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DeviceError::DeviceError(e) => write!(f, "medium error: {:?}", e),
            DeviceError::InvalidArgument => write!(f, "invalid argument"),
            DeviceError::NotFound => write!(f, "no such file or directory"),
            DeviceError::UnsupportedFormat => write!(f, "unsupported filesystem"),
            DeviceError::NoSuchDevice => write!(f, "no such device"),
            DeviceError::NoSuchVolume => write!(f, "no such volume"),
            DeviceError::FormatError(msg) => write!(f, "format error: {}", msg),
            DeviceError::BlockSizeTooLarge => write!(f, "block size too large for cache"),
            DeviceError::BadCluster => write!(f, "bad cluster in chain"),
            DeviceError::OpenedDirAsFile => write!(f, "is a directory"),
            DeviceError::OpenedFileAsDir => write!(f, "not a directory"),
            DeviceError::InvalidOffset => write!(f, "invalid offset"),
            DeviceError::NotInitialized => write!(f, "device not initialised"),
        }
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
