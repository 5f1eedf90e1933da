use log::trace;
use pcboot_common::DiskIo;

use crate::error::{Ext2Error, Result};
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::io::block_reader::BlockReader;
use crate::layout::block_group::{BlockGroupDesc, GROUP_DESC_SIZE};

/// Position of an inode inside the inode tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeLocation {
    pub group: u32,
    pub index: u32,
}

/// Block group descriptor accessor.
///
/// Descriptors are read on demand, one 32-byte record at a time; nothing is
/// cached between calls.
pub struct BlockGroupManager;

impl BlockGroupManager {
    /// Split a global (1-based) inode number into group and in-group index.
    pub fn locate_inode(super_block_manager: &SuperBlockManager, ino: u32) -> Result<InodeLocation> {
        if ino == 0 || ino > super_block_manager.super_block.s_inodes_count {
            return Err(Ext2Error::InvalidInode(ino));
        }

        let location = InodeLocation {
            group: (ino - 1) / super_block_manager.inodes_per_group,
            index: (ino - 1) % super_block_manager.inodes_per_group,
        };
        if location.group >= super_block_manager.group_count {
            return Err(Ext2Error::InvalidInode(ino));
        }
        Ok(location)
    }

    /// Byte offset of the descriptor table: the block after `first_data_block`.
    pub fn desc_table_offset(super_block_manager: &SuperBlockManager) -> u64 {
        super_block_manager.block_offset(super_block_manager.first_data_block + 1)
    }

    /// Read the descriptor of one block group.
    pub fn read_desc<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        group_no: u32,
    ) -> Result<BlockGroupDesc> {
        let offset = Self::desc_table_offset(super_block_manager)
            + group_no as u64 * GROUP_DESC_SIZE as u64;
        let mut raw = [0u8; GROUP_DESC_SIZE];
        reader.read_bytes(offset, &mut raw)?;

        let desc = BlockGroupDesc::parse(&raw);
        trace!("group {} inode table at block {}", group_no, desc.bg_inode_table);
        Ok(desc)
    }

    /// Block number of the inode table for the given group.
    pub fn inode_table_block<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        group_no: u32,
    ) -> Result<u32> {
        Ok(Self::read_desc(reader, super_block_manager, group_no)?.bg_inode_table)
    }
}
