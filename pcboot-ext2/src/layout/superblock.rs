use super::{read_u16_le, read_u32_le};
use crate::error::{Ext2Error, Result};

// ─── Constants ──────────────────────────────────────────────────────────────

/// ext2 super block magic number (at offset 0x38).
pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;

/// Super block is always at byte offset 1024 from start of the partition.
pub const SUPER_BLOCK_OFFSET: u64 = 1024;

/// Super block raw size is always 1024 bytes.
pub const SUPER_BLOCK_SIZE: usize = 1024;

/// The good old (original) format: fixed 128-byte inodes.
pub const REV_GOOD_OLD: u32 = 0;
/// Dynamic revision: inode size and features are declared in the super block.
pub const REV_DYNAMIC: u32 = 1;

/// Inode record size of revision 0 filesystems.
pub const REV0_INODE_SIZE: u16 = 128;

// ─── Feature flags ──────────────────────────────────────────────────────────

/// Directory records carry a file type byte (1-byte name length).
pub const INCOMPAT_FILETYPE: u32 = 0x0002;

/// Parsed ext2 super block.
///
/// Only the fields the boot path needs; parsed from the raw 1024-byte
/// on-disk super block via [`SuperBlock::parse()`].
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub s_inodes_count: u32,
    pub s_blocks_count: u32,
    pub s_first_data_block: u32,
    pub s_log_block_size: u32,
    pub s_blocks_per_group: u32,
    pub s_inodes_per_group: u32,
    pub s_magic: u16,
    pub s_rev_level: u32,

    // EXT2_DYNAMIC_REV only, zero on revision 0
    pub s_inode_size: u16,
    pub s_feature_compat: u32,
    pub s_feature_incompat: u32,
    pub s_feature_ro_compat: u32,
}

impl SuperBlock {
    /// Parse a super block from raw 1024-byte on-disk data.
    pub fn parse(raw: &[u8; SUPER_BLOCK_SIZE]) -> SuperBlock {
        SuperBlock {
            s_inodes_count: read_u32_le(raw, 0x00),
            s_blocks_count: read_u32_le(raw, 0x04),
            s_first_data_block: read_u32_le(raw, 0x14),
            s_log_block_size: read_u32_le(raw, 0x18),
            s_blocks_per_group: read_u32_le(raw, 0x20),
            s_inodes_per_group: read_u32_le(raw, 0x28),
            s_magic: read_u16_le(raw, 0x38),
            s_rev_level: read_u32_le(raw, 0x4C),
            s_inode_size: read_u16_le(raw, 0x58),
            s_feature_compat: read_u32_le(raw, 0x5C),
            s_feature_incompat: read_u32_le(raw, 0x60),
            s_feature_ro_compat: read_u32_le(raw, 0x64),
        }
    }

    /// Validate basic super block sanity.
    pub fn validate(&self) -> Result<()> {
        if self.s_magic != EXT2_SUPER_MAGIC {
            return Err(Ext2Error::InvalidMagic);
        }

        if self.s_inodes_per_group == 0 {
            return Err(Ext2Error::CorruptedFs("inodes_per_group is zero"));
        }

        if self.s_blocks_per_group == 0 {
            return Err(Ext2Error::CorruptedFs("blocks_per_group is zero"));
        }

        if self.s_blocks_count <= self.s_first_data_block {
            return Err(Ext2Error::CorruptedFs("no blocks past first_data_block"));
        }

        if self.s_rev_level != REV_GOOD_OLD && self.s_inode_size < REV0_INODE_SIZE {
            return Err(Ext2Error::CorruptedFs("inode_size < 128"));
        }

        Ok(())
    }

    // Convenience accessors

    /// log2 of the block size in bytes: `10 + s_log_block_size`.
    pub fn block_size_log2(&self) -> u32 {
        10u32.saturating_add(self.s_log_block_size)
    }

    /// On-disk inode record size: 128 for revision 0, else as declared.
    pub fn inode_size(&self) -> u16 {
        if self.s_rev_level == REV_GOOD_OLD {
            REV0_INODE_SIZE
        } else {
            self.s_inode_size
        }
    }

    /// Number of block groups.
    ///
    /// `ceil((blocks_count - first_data_block) / blocks_per_group)`
    pub fn group_count(&self) -> u32 {
        (self.s_blocks_count - self.s_first_data_block).div_ceil(self.s_blocks_per_group)
    }

    /// Whether directory records carry the file type byte.
    ///
    /// Revision 0 has no feature fields, so it always uses the legacy layout.
    pub fn has_filetype(&self) -> bool {
        self.s_rev_level != REV_GOOD_OLD && self.s_feature_incompat & INCOMPAT_FILETYPE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_super_block() -> [u8; SUPER_BLOCK_SIZE] {
        let mut raw = [0u8; SUPER_BLOCK_SIZE];
        raw[0x00..0x04].copy_from_slice(&64u32.to_le_bytes());
        raw[0x04..0x08].copy_from_slice(&20001u32.to_le_bytes());
        raw[0x14..0x18].copy_from_slice(&1u32.to_le_bytes());
        raw[0x20..0x24].copy_from_slice(&8192u32.to_le_bytes());
        raw[0x28..0x2C].copy_from_slice(&32u32.to_le_bytes());
        raw[0x38..0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
        raw[0x4C..0x50].copy_from_slice(&REV_DYNAMIC.to_le_bytes());
        raw[0x58..0x5A].copy_from_slice(&256u16.to_le_bytes());
        raw[0x60..0x64].copy_from_slice(&INCOMPAT_FILETYPE.to_le_bytes());
        raw
    }

    #[test]
    fn test_parse_dynamic_revision() {
        let sb = SuperBlock::parse(&raw_super_block());
        sb.validate().unwrap();

        assert_eq!(sb.block_size_log2(), 10);
        assert_eq!(sb.inode_size(), 256);
        // (20001 - 1) / 8192 rounded up
        assert_eq!(sb.group_count(), 3);
        assert!(sb.has_filetype());
    }

    #[test]
    fn test_revision0_ignores_dynamic_fields() {
        let mut raw = raw_super_block();
        raw[0x4C..0x50].copy_from_slice(&REV_GOOD_OLD.to_le_bytes());
        let sb = SuperBlock::parse(&raw);
        sb.validate().unwrap();

        assert_eq!(sb.inode_size(), 128);
        assert!(!sb.has_filetype());
    }

    #[test]
    fn test_validate_rejects_bad_magic() {
        let mut raw = raw_super_block();
        raw[0x38] = 0;
        let sb = SuperBlock::parse(&raw);
        assert_eq!(sb.validate(), Err(Ext2Error::InvalidMagic));
    }
}
