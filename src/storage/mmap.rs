//! # Memory-Mapped Block Store
//!
//! `MmapStore` backs a [`BlockStore`](super::BlockStore) with a single
//! memory-mapped file of concatenated fixed-size blocks:
//!
//! ```text
//! Offset 0:              Block 0 (superblock)
//! Offset blocksize:      Block 1
//! Offset 2*blocksize:    Block 2
//! ...
//! ```
//!
//! The file size is always `block_size * block_count`; geometry is fixed at
//! creation and never changes. Reads copy a block out of the map into the
//! caller's buffer, writes copy the caller's buffer back in, and `sync`
//! flushes the map. Copying (rather than handing out slices into the map)
//! keeps the node image's ownership model simple: the index owns its image,
//! the store owns the persistent bytes.
//!
//! ## Safety
//!
//! `MmapMut::map_mut` is unsafe because a file mapped writable can be
//! modified by other processes. The store assumes exclusive access to its
//! file for its lifetime, the same assumption the index makes about its
//! blocks.

use std::fs::OpenOptions;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

use super::{BlockStore, MIN_BLOCK_SIZE};

#[derive(Debug)]
pub struct MmapStore {
    mmap: MmapMut,
    block_size: usize,
    block_count: u64,
}

impl MmapStore {
    /// Creates a new store file of `block_count` zeroed blocks, truncating
    /// any existing file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize, block_count: u64) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            block_size >= MIN_BLOCK_SIZE,
            "block size {} below minimum {}",
            block_size,
            MIN_BLOCK_SIZE
        );
        ensure!(block_count > 0, "block count must be at least 1");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create store file '{}'", path.display()))?;

        let file_size = block_count * block_size as u64;
        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: the file was just created with truncate=true, so this
        // process holds the only reference to its contents. The map's
        // lifetime is tied to MmapStore, and all access is bounds-checked
        // against block_count in read_block/write_block.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            mmap,
            block_size,
            block_count,
        })
    }

    /// Opens an existing store file. `block_size` must match the geometry
    /// the file was created with; the file length must divide evenly into
    /// blocks of that size.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            block_size >= MIN_BLOCK_SIZE,
            "block size {} below minimum {}",
            block_size,
            MIN_BLOCK_SIZE
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open store file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        ensure!(file_size > 0, "store file '{}' is empty", path.display());
        ensure!(
            file_size % block_size as u64 == 0,
            "store file '{}' size {} is not a multiple of block size {}",
            path.display(),
            file_size,
            block_size
        );

        let block_count = file_size / block_size as u64;

        // SAFETY: the store assumes exclusive write access to its file (see
        // module docs); the map's lifetime is tied to MmapStore and all
        // access is bounds-checked against block_count.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            mmap,
            block_size,
            block_count,
        })
    }

    fn block_range(&self, n: u64) -> Result<std::ops::Range<usize>> {
        ensure!(
            n < self.block_count,
            "block {} out of bounds (block_count={})",
            n,
            self.block_count
        );
        let start = n as usize * self.block_size;
        Ok(start..start + self.block_size)
    }
}

impl BlockStore for MmapStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, n: u64, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() == self.block_size,
            "read buffer size {} != block size {}",
            buf.len(),
            self.block_size
        );
        let range = self.block_range(n)?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    fn write_block(&mut self, n: u64, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() == self.block_size,
            "write buffer size {} != block size {}",
            data.len(),
            self.block_size
        );
        let range = self.block_range(n)?;
        self.mmap[range].copy_from_slice(data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to flush store to disk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_produces_zeroed_blocks() {
        let dir = tempdir().unwrap();
        let store = MmapStore::create(dir.path().join("t.idx"), 128, 4).unwrap();

        assert_eq!(store.block_size(), 128);
        assert_eq!(store.block_count(), 4);

        let mut buf = vec![0xAAu8; 128];
        store.read_block(3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn create_rejects_tiny_blocks() {
        let dir = tempdir().unwrap();
        let result = MmapStore::create(dir.path().join("t.idx"), 16, 4);

        assert!(result.is_err());
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let mut store = MmapStore::create(dir.path().join("t.idx"), 128, 4).unwrap();

        let data: Vec<u8> = (0..128).map(|i| i as u8).collect();
        store.write_block(2, &data).unwrap();

        let mut buf = vec![0u8; 128];
        store.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn out_of_bounds_block_is_rejected() {
        let dir = tempdir().unwrap();
        let store = MmapStore::create(dir.path().join("t.idx"), 128, 4).unwrap();

        let mut buf = vec![0u8; 128];
        let result = store.read_block(4, &mut buf);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of bounds"));
    }

    #[test]
    fn mismatched_buffer_size_is_rejected() {
        let dir = tempdir().unwrap();
        let mut store = MmapStore::create(dir.path().join("t.idx"), 128, 4).unwrap();

        let mut small = vec![0u8; 64];
        assert!(store.read_block(0, &mut small).is_err());
        assert!(store.write_block(0, &small).is_err());
    }

    #[test]
    fn open_recovers_written_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");

        let data = vec![0x5Au8; 128];
        {
            let mut store = MmapStore::create(&path, 128, 4).unwrap();
            store.write_block(1, &data).unwrap();
            store.sync().unwrap();
        }

        let store = MmapStore::open(&path, 128).unwrap();
        assert_eq!(store.block_count(), 4);

        let mut buf = vec![0u8; 128];
        store.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn open_rejects_misaligned_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        let result = MmapStore::open(&path, 128);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not a multiple of block size"));
    }
}
