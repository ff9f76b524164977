//! Print a file from a FAT disk image.
//!
//! ```bash
//! $ cargo run --example cat -- ./disk.img LOGS/BOOT.TXT
//! ```
//!
//! The image must carry an MBR with the FAT volume in its first partition.
//! The cache statistics go to stderr once the file is printed.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use sdstore::cache::clock::SequenceClock;
use sdstore::{BlockCount, BlockDevice, BlockIdx, CachedDevice, Fat, Pool, VolumeIdx, BLOCK_LEN};

#[derive(Debug)]
pub struct LinuxBlockDevice {
    file: RefCell<File>,
    print_blocks: bool,
}

impl LinuxBlockDevice {
    pub fn new<P>(filename: P, print_blocks: bool) -> Result<LinuxBlockDevice, std::io::Error>
    where
        P: AsRef<Path>,
    {
        Ok(LinuxBlockDevice {
            file: RefCell::new(OpenOptions::new().read(true).write(true).open(filename)?),
            print_blocks,
        })
    }
}

impl BlockDevice for LinuxBlockDevice {
    type E = std::io::Error;

    fn initialize(&mut self) -> Result<(), Self::E> {
        Ok(())
    }

    fn eject(&mut self) -> Result<(), Self::E> {
        self.file.borrow_mut().flush()
    }

    fn insert(&mut self) -> Result<(), Self::E> {
        Ok(())
    }

    fn num_blocks(&self) -> BlockCount {
        let len = self
            .file
            .borrow()
            .metadata()
            .map(|meta| meta.len())
            .unwrap_or(0);
        BlockCount((len / u64::from(BLOCK_LEN)) as u32)
    }

    fn block_len(&self) -> usize {
        BLOCK_LEN as usize
    }

    fn read_block(&mut self, block_idx: BlockIdx, data: &mut [u8]) -> Result<(), Self::E> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(block_idx.into_bytes(data.len())))?;
        file.read_exact(data)?;
        if self.print_blocks {
            eprintln!("Read block {}", block_idx.0);
        }
        Ok(())
    }

    fn write_block(&mut self, block_idx: BlockIdx, data: &[u8]) -> Result<(), Self::E> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(block_idx.into_bytes(data.len())))?;
        file.write_all(data)?;
        if self.print_blocks {
            eprintln!("Wrote block {}", block_idx.0);
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let filename = args.next().unwrap_or_else(|| "/dev/mmcblk0".into());
    let path = args.next().unwrap_or_else(|| "README.TXT".into());
    let print_blocks = args.any(|arg| arg == "-v");

    let device = LinuxBlockDevice::new(filename, print_blocks)?;
    let cache: CachedDevice<_, _> = CachedDevice::new(device, SequenceClock::new());
    let mut fat = Fat::mount(cache, VolumeIdx(0)).map_err(|e| e.to_string())?;

    let mut stdout = std::io::stdout();
    {
        let mut file = fat.open(&path).map_err(|e| e.to_string())?;
        let mut buffer = [0u8; 64];
        while !file.is_eof() {
            let n = file.read_bytes(&mut buffer).map_err(|e| e.to_string())?;
            if n == 0 {
                break;
            }
            stdout.write_all(&buffer[..n])?;
        }
        file.close().map_err(|e| e.to_string())?;
    }

    eprintln!("Data pool\n{}", fat.cache().report(Pool::Data));
    eprintln!("System pool\n{}", fat.cache().report(Pool::System));
    Ok(())
}
