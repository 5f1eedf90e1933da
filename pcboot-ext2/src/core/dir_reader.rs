use alloc::vec::Vec;
use core::ops::ControlFlow;

use log::debug;
use pcboot_common::DiskIo;

use crate::error::{Ext2Error, Result};
use crate::fs_core::file_reader::FileReader;
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::fs_core::traversal::TraversalContext;
use crate::io::block_reader::BlockReader;
use crate::layout::dir_entry::{DirEntry, DirEntryFormat, DirRecords};
use crate::layout::inode::Inode;

/// Directory reader for `readdir` and `lookup`.
///
/// Both stream the directory file block by block; records never span a
/// block boundary.
pub struct DirReader;

impl DirReader {
    /// Read all non-empty directory entries in a directory inode, in on-disk
    /// order.
    pub fn read_dir_entries<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        ctx: &mut TraversalContext,
        dir_inode: &Inode,
    ) -> Result<Vec<DirEntry>> {
        if !dir_inode.is_dir() {
            return Err(Ext2Error::NotDirectory);
        }

        let format = super_block_manager.dir_format;
        let mut out = Vec::new();
        let _flow = FileReader::stream(reader, super_block_manager, ctx, dir_inode, |block| {
            out.extend(
                DirRecords::new(block, format)
                    .filter(|record| !record.is_unused())
                    .map(|record| DirEntry::from_record(&record)),
            );
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Linear lookup in a directory.
    ///
    /// Stops streaming at the first record whose name matches; `None` when
    /// the directory has no such entry.
    pub fn lookup<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        ctx: &mut TraversalContext,
        dir_inode: &Inode,
        name: &[u8],
    ) -> Result<Option<u32>> {
        if !dir_inode.is_dir() {
            return Err(Ext2Error::NotDirectory);
        }

        let mut scan = DirScan::new(name, super_block_manager.dir_format);
        let _flow = FileReader::stream(reader, super_block_manager, ctx, dir_inode, |block| {
            scan.consume(block)
        })?;
        Ok(scan.found())
    }
}

/// Streaming consumer that searches directory blocks for one name.
pub struct DirScan<'n> {
    target: &'n [u8],
    format: DirEntryFormat,
    found: Option<u32>,
}

impl<'n> DirScan<'n> {
    pub fn new(target: &'n [u8], format: DirEntryFormat) -> Self {
        Self {
            target,
            format,
            found: None,
        }
    }

    /// Scan one directory block; breaks once the name is found.
    pub fn consume(&mut self, block: &[u8]) -> ControlFlow<()> {
        for record in DirRecords::new(block, self.format) {
            if !record.is_unused() && record.name == self.target {
                debug!(
                    "found {:?} at inode {}",
                    core::str::from_utf8(record.name).unwrap_or("?"),
                    record.inode
                );
                self.found = Some(record.inode);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub fn found(&self) -> Option<u32> {
        self.found
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::ops::ControlFlow;

    use super::DirScan;
    use crate::layout::dir_entry::DirEntryFormat;

    fn block_with(records: &[(u32, &str)]) -> Vec<u8> {
        let mut block = Vec::new();
        for &(inode, name) in records {
            let rec_len = (8 + name.len()).next_multiple_of(4);
            block.extend_from_slice(&inode.to_le_bytes());
            block.extend_from_slice(&(rec_len as u16).to_le_bytes());
            block.extend_from_slice(&[name.len() as u8, 1]);
            block.extend_from_slice(name.as_bytes());
            block.resize(block.len().next_multiple_of(4), 0);
        }
        block
    }

    #[test]
    fn test_scan_breaks_on_match() {
        let block = block_with(&[(2, "."), (2, ".."), (14, "memtest86+.bin")]);
        let mut scan = DirScan::new(b"memtest86+.bin", DirEntryFormat::WithFileType);
        assert_eq!(scan.consume(&block), ControlFlow::Break(()));
        assert_eq!(scan.found(), Some(14));
    }

    #[test]
    fn test_scan_skips_deleted_records() {
        let block = block_with(&[(0, "kernel"), (2, ".")]);
        let mut scan = DirScan::new(b"kernel", DirEntryFormat::WithFileType);
        assert_eq!(scan.consume(&block), ControlFlow::Continue(()));
        assert_eq!(scan.found(), None);
    }

    #[test]
    fn test_scan_requires_exact_name() {
        let block = block_with(&[(12, "memtest86+.bin.old")]);
        let mut scan = DirScan::new(b"memtest86+.bin", DirEntryFormat::WithFileType);
        assert_eq!(scan.consume(&block), ControlFlow::Continue(()));
        assert_eq!(scan.found(), None);
    }
}
