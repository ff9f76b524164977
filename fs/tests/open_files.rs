//! File handle tests

use sdstore::{
    cache::clock::SequenceClock, filesystem::cluster::ClusterId, BlockIdx, DeviceError, Fat,
    VolumeIdx,
};

mod utils;

use utils::{make_cache, pattern, Error, FatImage, RamDisk, ATTR_ARCHIVE, BLOCK_LEN};

type TestFat = Fat<RamDisk, SequenceClock>;

const SEEK_LEN: usize = 2000;

fn image() -> FatImage {
    let mut image = FatImage::fat16();
    image.add_file(0, b"A       TXT", 5, b"0123456789");
    image.add_file(0, b"SEEK    BIN", 20, &pattern(SEEK_LEN));
    image.add_file(0, b"EMPTY   DAT", 0, b"");
    image.add_dir(0, b"LOGS       ", 30);
    // The entry promises more than the chain holds.
    image.write_chain(&[40], &pattern(512));
    image.add_entry(0, b"SHORT   BIN", ATTR_ARCHIVE, 40, 1024);
    image
}

fn mount_image(image: &FatImage) -> TestFat {
    Fat::mount(make_cache(RamDisk::new(image.build())), VolumeIdx(0)).expect("mount")
}

#[test]
fn peek_does_not_advance() {
    let mut fat = mount_image(&image());
    let mut file = fat.open("A.TXT").expect("open file");
    assert_eq!(file.peek().expect("peek"), Some(b'0'));
    assert_eq!(file.peek().expect("peek"), Some(b'0'));
    assert_eq!(file.offset(), 0);
    assert_eq!(file.read().expect("read"), Some(b'0'));
    assert_eq!(file.read().expect("read"), Some(b'1'));
    assert_eq!(file.offset(), 2);
    assert_eq!(file.available(), 8);

    file.seek_from_end(0).expect("seek");
    assert_eq!(file.peek().expect("peek"), None);
    assert_eq!(file.read().expect("read"), None);
}

#[test]
fn small_reads_cross_clusters() {
    let mut fat = mount_image(&image());
    let mut file = fat.open("SEEK.BIN").expect("open file");
    let mut contents = Vec::new();
    let mut buffer = [0u8; 7];
    loop {
        let n = file.read_bytes(&mut buffer).expect("read");
        if n == 0 {
            break;
        }
        contents.extend_from_slice(&buffer[..n]);
    }
    assert_eq!(contents, pattern(SEEK_LEN));
    assert!(file.is_eof());
}

#[test]
fn seeking() {
    let expected = pattern(SEEK_LEN);
    let mut fat = mount_image(&image());
    let mut file = fat.open("SEEK.BIN").expect("open file");

    let mut buffer = vec![0u8; 1500];
    assert_eq!(file.read_bytes(&mut buffer).expect("read"), 1500);
    assert_eq!(file.offset(), 1500);

    // Back into the first cluster.
    file.seek_from_start(100).expect("seek");
    let mut small = [0u8; 10];
    assert_eq!(file.read_bytes(&mut small).expect("read"), 10);
    assert_eq!(&small[..], &expected[100..110]);

    file.seek_from_current(1000).expect("seek");
    assert_eq!(file.offset(), 1110);
    assert_eq!(file.read().expect("read"), Some(expected[1110]));

    file.seek_from_end(2000).expect("seek");
    assert_eq!(file.offset(), 0);
    assert_eq!(file.read().expect("read"), Some(expected[0]));

    file.seek_from_end(1).expect("seek");
    assert_eq!(file.read().expect("read"), Some(expected[1999]));
    assert!(file.is_eof());

    assert_eq!(file.seek_from_start(2001), Err(DeviceError::InvalidOffset));
    assert_eq!(file.seek_from_end(2001), Err(DeviceError::InvalidOffset));
    assert_eq!(file.seek_from_current(1), Err(DeviceError::InvalidOffset));
    file.seek_from_start(0).expect("seek");
    assert_eq!(file.seek_from_current(-1), Err(DeviceError::InvalidOffset));
    assert_eq!(file.offset(), 0);
}

#[test]
fn read_failure_part_way_returns_what_arrived() {
    let image = image();
    let mut fat = mount_image(&image);
    fat.cache_mut()
        .device()
        .fail_reads
        .insert(image.cluster_block_abs(21));

    let mut file = fat.open("SEEK.BIN").expect("open file");
    let mut buffer = vec![0u8; SEEK_LEN];
    assert_eq!(file.read_bytes(&mut buffer).expect("read"), 512);
    assert_eq!(&buffer[..512], &pattern(SEEK_LEN)[..512]);
    assert_eq!(file.offset(), 512);

    // Nothing at all comes through now, so the error shows.
    assert_eq!(
        file.read_bytes(&mut buffer),
        Err(DeviceError::DeviceError(Error::Injected(BlockIdx(
            image.cluster_block_abs(21)
        ))))
    );
    drop(file);

    fat.cache_mut().device().fail_reads.clear();
    let mut file = fat.open("SEEK.BIN").expect("open file");
    file.seek_from_start(512).expect("seek");
    assert_eq!(file.read_bytes(&mut buffer).expect("read"), SEEK_LEN - 512);
    assert_eq!(&buffer[..SEEK_LEN - 512], &pattern(SEEK_LEN)[512..]);
}

#[test]
fn chain_shorter_than_entry() {
    let mut fat = mount_image(&image());
    let mut file = fat.open("SHORT.BIN").expect("open file");
    assert_eq!(file.length(), 1024);
    let mut buffer = vec![0u8; 1024];
    assert_eq!(file.read_bytes(&mut buffer).expect("read"), 512);
    assert!(matches!(
        file.read_bytes(&mut buffer),
        Err(DeviceError::FormatError(_))
    ));
}

#[test]
fn empty_file() {
    let mut fat = mount_image(&image());
    let mut file = fat.open("EMPTY.DAT").expect("open file");
    assert_eq!(file.length(), 0);
    assert_eq!(file.starting_cluster(), ClusterId(0));
    assert!(file.is_eof());
    assert_eq!(file.read().expect("read"), None);
    let mut buffer = [0u8; 4];
    assert_eq!(file.read_bytes(&mut buffer).expect("read"), 0);
    file.close().expect("close");
}

#[test]
fn directories_are_not_files() {
    let mut fat = mount_image(&image());
    assert_eq!(
        fat.open("LOGS").err(),
        Some(DeviceError::OpenedDirAsFile)
    );
}

#[test]
fn close_flushes_pending_writes() {
    let mut fat = mount_image(&image());
    fat.cache_mut()
        .write_data(BlockIdx(200), &[0x42; BLOCK_LEN])
        .expect("write");
    let file = fat.open("A.TXT").expect("open file");
    file.close().expect("close");
    assert_eq!(fat.cache().medium().block(200), &[0x42; BLOCK_LEN][..]);
}

#[test]
fn drop_flushes_pending_writes() {
    let mut fat = mount_image(&image());
    fat.cache_mut()
        .write_system(BlockIdx(201), &[0x24; BLOCK_LEN])
        .expect("write");
    {
        let mut file = fat.open("A.TXT").expect("open file");
        file.read().expect("read");
    }
    assert_eq!(fat.cache().medium().block(201), &[0x24; BLOCK_LEN][..]);
}

#[test]
fn close_reports_flush_failure() {
    let mut fat = mount_image(&image());
    let cache = fat.cache_mut();
    cache
        .write_data(BlockIdx(202), &[0x11; BLOCK_LEN])
        .expect("write");
    cache.device().fail_writes.insert(202);
    let file = fat.open("A.TXT").expect("open file");
    assert_eq!(
        file.close(),
        Err(DeviceError::DeviceError(Error::Injected(BlockIdx(202))))
    );
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
