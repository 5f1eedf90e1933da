use super::{read_u16_le, read_u32_le};

/// On-disk size of an ext2 block group descriptor.
pub const GROUP_DESC_SIZE: usize = 32;

/// Parsed ext2 block group descriptor.
///
/// Bridges from the super block to per-group metadata; the boot path only
/// follows `bg_inode_table`.
#[derive(Debug, Clone)]
pub struct BlockGroupDesc {
    pub bg_block_bitmap: u32,
    pub bg_inode_bitmap: u32,
    pub bg_inode_table: u32,
    pub bg_free_blocks_count: u16,
    pub bg_free_inodes_count: u16,
    pub bg_used_dirs_count: u16,
}

impl BlockGroupDesc {
    /// Parse a block group descriptor from its raw 32 bytes.
    pub fn parse(raw: &[u8; GROUP_DESC_SIZE]) -> BlockGroupDesc {
        BlockGroupDesc {
            bg_block_bitmap: read_u32_le(raw, 0x00),
            bg_inode_bitmap: read_u32_le(raw, 0x04),
            bg_inode_table: read_u32_le(raw, 0x08),
            bg_free_blocks_count: read_u16_le(raw, 0x0C),
            bg_free_inodes_count: read_u16_le(raw, 0x0E),
            bg_used_dirs_count: read_u16_le(raw, 0x10),
        }
    }
}
