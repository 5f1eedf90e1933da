use log::trace;
use pcboot_common::{DiskIo, SECTOR_SIZE_LOG2};

use crate::error::Result;

/// Block reader wrapping a [`DiskIo`] with partition-relative reads.
///
/// Thin convenience layer that translates partition byte offsets and
/// filesystem block numbers into absolute sector reads on one drive.
pub struct BlockReader<D: DiskIo> {
    disk: D,
    drive: u8,
    start_sector: u64,
    block_size_log2: u32,
}

impl<D: DiskIo> BlockReader<D> {
    /// Create a reader for the partition starting at `start_sector`.
    ///
    /// Block reads assume 1 KiB blocks until [`Self::set_block_size_log2`].
    pub fn new(disk: D, drive: u8, start_sector: u64) -> Self {
        Self {
            disk,
            drive,
            start_sector,
            block_size_log2: 10,
        }
    }

    pub fn set_block_size_log2(&mut self, block_size_log2: u32) {
        self.block_size_log2 = block_size_log2;
    }

    /// Read one filesystem block into `buf`.
    ///
    /// `buf.len()` must equal the block size.
    pub fn read_block(&self, block_no: u32, buf: &mut [u8]) -> Result<()> {
        trace!("read block {}", block_no);
        let sector = (block_no as u64) << (self.block_size_log2 - SECTOR_SIZE_LOG2);
        self.read_sectors(sector, buf)
    }

    /// Read whole sectors starting at the partition-relative `sector`.
    pub fn read_sectors(&self, sector: u64, buf: &mut [u8]) -> Result<()> {
        self.disk
            .read_sectors(self.drive, self.start_sector + sector, buf)?;
        Ok(())
    }

    /// Read `buf.len()` bytes starting at the partition-relative byte offset.
    ///
    /// Used for the super block, group descriptors and inode records.
    pub fn read_bytes(&self, byte_offset: u64, buf: &mut [u8]) -> Result<()> {
        let start_byte = self.start_sector << SECTOR_SIZE_LOG2;
        self.disk
            .read_bytes(self.drive, start_byte + byte_offset, buf)?;
        Ok(())
    }
}
