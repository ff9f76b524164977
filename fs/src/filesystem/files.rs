use crate::{
    blockdevice::BlockDevice,
    cache::clock::TimeSource,
    fat::Fat,
    filesystem::cluster::ClusterId,
    DeviceError,
};

/// Everything needed to read a file, apart from the filesystem itself.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// The directory holding the file
    pub(crate) parent: ClusterId,
    /// The starting point of the file.
    pub(crate) starting_cluster: ClusterId,
    /// How far through the file we've read (in bytes).
    pub(crate) current_offset: u32,
    /// What is the length of the file, in bytes.
    pub(crate) length: u32,
    /// The byte offset of the start of `current_cluster.1`, and that
    /// cluster. Saves walking the chain from the start on every read.
    pub(crate) current_cluster: (u32, ClusterId),
}

impl FileInfo {
    pub(crate) fn new(parent: ClusterId, starting_cluster: ClusterId, length: u32) -> FileInfo {
        FileInfo {
            parent,
            starting_cluster,
            current_offset: 0,
            length,
            current_cluster: (0, starting_cluster),
        }
    }

    /// Are we at the end of the file?
    pub fn eof(&self) -> bool {
        self.current_offset == self.length
    }

    /// How long is the file?
    pub fn length(&self) -> u32 {
        self.length
    }

    /// How many bytes are left to read?
    pub fn left(&self) -> u32 {
        self.length - self.current_offset
    }

    /// Seek to a new position in the file, relative to the start of the file.
    pub fn seek_from_start(&mut self, offset: u32) -> Result<(), ()> {
        if offset <= self.length {
            self.current_offset = offset;
            if offset < self.current_cluster.0 {
                // Back to start
                self.current_cluster = (0, self.starting_cluster);
            }
            Ok(())
        } else {
            Err(())
        }
    }

    /// Seek to a new position in the file, relative to the end of the file.
    pub fn seek_from_end(&mut self, offset: u32) -> Result<(), ()> {
        if offset <= self.length {
            self.current_offset = self.length - offset;
            if self.current_offset < self.current_cluster.0 {
                // Back to start
                self.current_cluster = (0, self.starting_cluster);
            }
            Ok(())
        } else {
            Err(())
        }
    }

    /// Seek to a new position in the file, relative to the current position.
    pub fn seek_from_current(&mut self, offset: i32) -> Result<(), ()> {
        let new_offset = i64::from(self.current_offset) + i64::from(offset);
        if new_offset >= 0 && new_offset <= i64::from(self.length) {
            self.seek_from_start(new_offset as u32)
        } else {
            Err(())
        }
    }
}

/// A file open for reading.
///
/// Holds the filesystem mutably, so only one file is open at a time.
///
/// Dropping the file syncs the cache underneath, but any error that may
/// occur is ignored. To see it, use [`File::close`].
pub struct File<'a, D, T, const SLOTS: usize, const MAX_BLOCK: usize>
where
    D: BlockDevice,
    T: TimeSource,
{
    info: FileInfo,
    fs: &'a mut Fat<D, T, SLOTS, MAX_BLOCK>,
}

impl<'a, D, T, const SLOTS: usize, const MAX_BLOCK: usize> File<'a, D, T, SLOTS, MAX_BLOCK>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub(crate) fn new(info: FileInfo, fs: &'a mut Fat<D, T, SLOTS, MAX_BLOCK>) -> Self {
        File { info, fs }
    }

    /// Read the next byte, or `None` at the end of the file.
    pub fn read(&mut self) -> Result<Option<u8>, DeviceError<D::E>> {
        let mut byte = [0u8];
        match self.read_bytes(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// The next byte, without moving past it.
    pub fn peek(&mut self) -> Result<Option<u8>, DeviceError<D::E>> {
        let offset = self.info.current_offset;
        let cluster = self.info.current_cluster;
        let byte = self.read();
        self.info.current_offset = offset;
        self.info.current_cluster = cluster;
        byte
    }

    /// Read as much of the file as fits into `buffer`.
    ///
    /// Returns how many bytes arrived. That is less than the buffer holds
    /// only at the end of the file, or when the medium fails part way; a
    /// failure before anything was read is returned as an error.
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, DeviceError<D::E>> {
        let len = buffer.len().min(self.info.left() as usize);
        let mut read = 0;
        while read < len {
            match self.fs.read_at(
                self.info.starting_cluster,
                &mut self.info.current_cluster,
                self.info.current_offset,
                &mut buffer[read..len],
            ) {
                Ok(0) if read == 0 => {
                    return Err(DeviceError::FormatError("Cluster chain shorter than file"))
                }
                Ok(0) => break,
                Ok(n) => {
                    read += n;
                    self.info.current_offset += n as u32;
                }
                Err(e) if read == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(read)
    }

    /// Bytes left before the end of the file.
    pub fn available(&self) -> u32 {
        self.info.left()
    }

    /// Is the file at End Of File?
    pub fn is_eof(&self) -> bool {
        self.info.eof()
    }

    /// Get the length of the file
    pub fn length(&self) -> u32 {
        self.info.length()
    }

    /// Get the current offset of the file
    pub fn offset(&self) -> u32 {
        self.info.current_offset
    }

    /// The directory the file was found in.
    pub fn parent(&self) -> ClusterId {
        self.info.parent
    }

    /// First cluster of the file, zero for an empty file.
    pub fn starting_cluster(&self) -> ClusterId {
        self.info.starting_cluster
    }

    /// Seek to a new position in the file, relative to the start of the file.
    pub fn seek_from_start(&mut self, offset: u32) -> Result<(), DeviceError<D::E>> {
        self.info
            .seek_from_start(offset)
            .map_err(|_| DeviceError::InvalidOffset)
    }

    /// Seek to a new position in the file, relative to the current position.
    pub fn seek_from_current(&mut self, offset: i32) -> Result<(), DeviceError<D::E>> {
        self.info
            .seek_from_current(offset)
            .map_err(|_| DeviceError::InvalidOffset)
    }

    /// Seek to a new position in the file, relative to the end of the file.
    pub fn seek_from_end(&mut self, offset: u32) -> Result<(), DeviceError<D::E>> {
        self.info
            .seek_from_end(offset)
            .map_err(|_| DeviceError::InvalidOffset)
    }

    /// Write any pending blocks of the filesystem to the medium.
    pub fn flush(&mut self) -> Result<(), DeviceError<D::E>> {
        self.fs.sync()
    }

    /// Consume the `File` handle and close it. The behavior of this is
    /// similar to using [`core::mem::drop`] or letting the `File` go out of
    /// scope, except this lets the user handle any errors that may occur in
    /// the process, whereas when using drop, any errors will be discarded
    /// silently.
    pub fn close(self) -> Result<(), DeviceError<D::E>> {
        let result = self.fs.sync();
        core::mem::forget(self);
        result
    }
}

impl<'a, D, T, const SLOTS: usize, const MAX_BLOCK: usize> Drop for File<'a, D, T, SLOTS, MAX_BLOCK>
where
    D: BlockDevice,
    T: TimeSource,
{
    fn drop(&mut self) {
        _ = self.fs.sync();
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
