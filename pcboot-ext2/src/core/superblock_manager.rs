use log::debug;

use crate::config::MAX_BLOCK_SIZE;
use crate::error::{Ext2Error, Result};
use crate::io::block_reader::BlockReader;
use crate::layout::dir_entry::DirEntryFormat;
use crate::layout::superblock::{SUPER_BLOCK_OFFSET, SUPER_BLOCK_SIZE, SuperBlock};
use pcboot_common::{DiskIo, SECTOR_SIZE_LOG2};

/// Super block manager.
///
/// Loads the super block from disk, validates it, and caches the derived
/// volume geometry so that every caller does not need to re-derive it.
///
/// This is the very first step of opening a volume.
#[derive(Debug, Clone)]
pub struct SuperBlockManager {
    /// The parsed super block.
    pub super_block: SuperBlock,
    /// Filesystem block size in bytes (`1024 << s_log_block_size`).
    pub block_size: usize,
    pub block_size_log2: u32,
    /// 512-byte sectors per block (`2^(1 + s_log_block_size)`).
    pub sectors_per_block: u32,
    pub inodes_per_group: u32,
    pub first_data_block: u32,
    /// On-disk inode record size (128 on revision 0).
    pub inode_size: u16,
    /// Number of block groups.
    pub group_count: u32,
    /// Directory record layout selected by `INCOMPAT_FILETYPE`.
    pub dir_format: DirEntryFormat,
}

impl SuperBlockManager {
    /// Load the super block via the given block reader.
    ///
    /// 1. Read 1024 raw bytes from byte offset 1024.
    /// 2. `SuperBlock::parse()` + `validate()`.
    /// 3. Cache derived parameters.
    pub fn load<D: DiskIo>(reader: &BlockReader<D>) -> Result<Self> {
        let mut raw = [0u8; SUPER_BLOCK_SIZE];
        reader.read_bytes(SUPER_BLOCK_OFFSET, &mut raw)?;

        let super_block = SuperBlock::parse(&raw);
        super_block.validate()?;
        Self::from_super_block(super_block)
    }

    /// Derive the volume geometry from an already validated super block.
    pub fn from_super_block(super_block: SuperBlock) -> Result<Self> {
        let block_size_log2 = super_block.block_size_log2();
        if block_size_log2 > MAX_BLOCK_SIZE.trailing_zeros() {
            return Err(Ext2Error::UnsupportedBlockSize(
                1u32.checked_shl(block_size_log2).unwrap_or(u32::MAX),
            ));
        }

        let dir_format = if super_block.has_filetype() {
            DirEntryFormat::WithFileType
        } else {
            DirEntryFormat::Legacy
        };

        let manager = SuperBlockManager {
            block_size: 1usize << block_size_log2,
            block_size_log2,
            sectors_per_block: 1 << (block_size_log2 - SECTOR_SIZE_LOG2),
            inodes_per_group: super_block.s_inodes_per_group,
            first_data_block: super_block.s_first_data_block,
            inode_size: super_block.inode_size(),
            group_count: super_block.group_count(),
            dir_format,
            super_block,
        };
        debug!(
            "ext2 geometry: block_size={} groups={} inodes_per_group={} inode_size={} dir_format={:?}",
            manager.block_size,
            manager.group_count,
            manager.inodes_per_group,
            manager.inode_size,
            manager.dir_format,
        );
        Ok(manager)
    }

    /// Block pointers per indirect block, as a power of two.
    pub fn pointers_per_block_log2(&self) -> u32 {
        self.block_size_log2 - 2
    }

    /// Byte offset of a block within the partition.
    pub fn block_offset(&self, block_no: u32) -> u64 {
        (block_no as u64) << self.block_size_log2
    }
}
