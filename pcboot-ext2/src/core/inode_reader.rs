use log::debug;
use pcboot_common::DiskIo;

use crate::config::ROOT_INODE;
use crate::error::Result;
use crate::fs_core::block_group_manager::BlockGroupManager;
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::io::block_reader::BlockReader;
use crate::layout::inode::{INODE_RECORD_SIZE, Inode};

/// Inode reader: locates and reads inodes by number.
///
/// Stateless: all context is passed as parameters.
pub struct InodeReader;

impl InodeReader {
    /// Read and parse the inode with the given inode number.
    ///
    /// 1. `group = (ino - 1) / inodes_per_group`, `index = (ino - 1) % inodes_per_group`
    /// 2. `table_block` from the group's descriptor
    /// 3. `byte_offset = table_block * block_size + index * inode_size`
    /// 4. Read `min(INODE_RECORD_SIZE, inode_size)` bytes into a zeroed record
    pub fn read_inode<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        ino: u32,
    ) -> Result<Inode> {
        let location = BlockGroupManager::locate_inode(super_block_manager, ino)?;
        let table_block =
            BlockGroupManager::inode_table_block(reader, super_block_manager, location.group)?;
        let inode_size = super_block_manager.inode_size as usize;
        let byte_offset = super_block_manager.block_offset(table_block)
            + location.index as u64 * inode_size as u64;

        let mut raw = [0u8; INODE_RECORD_SIZE];
        let len = core::cmp::min(INODE_RECORD_SIZE, inode_size);
        reader.read_bytes(byte_offset, &mut raw[..len])?;

        let inode = Inode::parse(&raw);
        debug!(
            "inode {}: mode={:#o} size={} links={}",
            ino, inode.i_mode, inode.i_size, inode.i_links_count
        );
        Ok(inode)
    }

    /// Read the root directory inode (always inode 2).
    pub fn read_root_inode<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
    ) -> Result<Inode> {
        Self::read_inode(reader, super_block_manager, ROOT_INODE)
    }
}
