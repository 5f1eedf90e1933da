use super::{read_u16_le, read_u32_le};

// Mode constants (i_mode & S_IFMT)
pub const S_IFMT: u16 = 0xF000;
pub const S_IFREG: u16 = 0x8000;
pub const S_IFDIR: u16 = 0x4000;

// Block pointer slots in i_block
pub const NDIR_BLOCKS: usize = 12;
pub const IND_BLOCK: usize = NDIR_BLOCKS;
pub const DIND_BLOCK: usize = IND_BLOCK + 1;
pub const TIND_BLOCK: usize = DIND_BLOCK + 1;
pub const N_BLOCKS: usize = TIND_BLOCK + 1;

/// In-memory inode record size: the 128-byte base record plus the extra
/// fields of large inodes. Shorter on-disk records leave the tail zeroed.
pub const INODE_RECORD_SIZE: usize = 160;

/// Parsed ext2 inode.
///
/// uid/gid/size fields are already combined from their lo/hi halves.
#[derive(Debug, Clone)]
pub struct Inode {
    pub i_mode: u16,
    /// Combined: `(uid_hi << 16) | uid_lo`
    pub i_uid: u32,
    /// Combined: `(gid_hi << 16) | gid_lo`
    pub i_gid: u32,
    /// Combined: `(size_high << 32) | size_lo`
    pub i_size: u64,
    pub i_atime: u32,
    pub i_ctime: u32,
    pub i_mtime: u32,
    pub i_dtime: u32,
    pub i_links_count: u16,
    /// In 512-byte units.
    pub i_blocks: u32,
    pub i_flags: u32,
    /// 12 direct pointers, then the single, double and triple indirect roots.
    pub i_block: [u32; N_BLOCKS],
    pub i_generation: u32,
    pub i_file_acl: u32,
    /// Extra inode size beyond 128 bytes (0 if the record is 128 bytes).
    pub i_extra_isize: u16,
    pub i_crtime: u32,
}

impl Inode {
    /// Parse an inode from a zero-filled in-memory record.
    pub fn parse(raw: &[u8; INODE_RECORD_SIZE]) -> Inode {
        let i_uid_lo = read_u16_le(raw, 0x02);
        let i_size_lo = read_u32_le(raw, 0x04);
        let i_gid_lo = read_u16_le(raw, 0x18);
        let i_size_high = read_u32_le(raw, 0x6C);
        let i_uid_hi = read_u16_le(raw, 0x78);
        let i_gid_hi = read_u16_le(raw, 0x7A);

        let i_block = core::array::from_fn(|i| read_u32_le(raw, 0x28 + i * 4));

        Inode {
            i_mode: read_u16_le(raw, 0x00),
            i_uid: ((i_uid_hi as u32) << 16) | (i_uid_lo as u32),
            i_gid: ((i_gid_hi as u32) << 16) | (i_gid_lo as u32),
            i_size: ((i_size_high as u64) << 32) | (i_size_lo as u64),
            i_atime: read_u32_le(raw, 0x08),
            i_ctime: read_u32_le(raw, 0x0C),
            i_mtime: read_u32_le(raw, 0x10),
            i_dtime: read_u32_le(raw, 0x14),
            i_links_count: read_u16_le(raw, 0x1A),
            i_blocks: read_u32_le(raw, 0x1C),
            i_flags: read_u32_le(raw, 0x20),
            i_block,
            i_generation: read_u32_le(raw, 0x64),
            i_file_acl: read_u32_le(raw, 0x68),
            i_extra_isize: read_u16_le(raw, 0x80),
            i_crtime: read_u32_le(raw, 0x90),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.i_mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.i_mode & S_IFMT == S_IFREG
    }

    /// Number of logical blocks covering `i_size`.
    pub fn block_count(&self, block_size_log2: u32) -> u64 {
        self.i_size.div_ceil(1u64 << block_size_log2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_combines_halves_and_pointers() {
        let mut raw = [0u8; INODE_RECORD_SIZE];
        raw[0x00..0x02].copy_from_slice(&(S_IFREG | 0o644).to_le_bytes());
        raw[0x04..0x08].copy_from_slice(&0x1000u32.to_le_bytes());
        raw[0x6C..0x70].copy_from_slice(&1u32.to_le_bytes());
        for i in 0..N_BLOCKS {
            let off = 0x28 + i * 4;
            raw[off..off + 4].copy_from_slice(&(100 + i as u32).to_le_bytes());
        }

        let inode = Inode::parse(&raw);
        assert_eq!(inode.i_size, (1u64 << 32) | 0x1000);
        assert_eq!(inode.i_block[0], 100);
        assert_eq!(inode.i_block[TIND_BLOCK], 114);
        assert!(inode.is_file());
        assert_eq!(inode.i_extra_isize, 0);
    }

    #[test]
    fn test_block_count_rounds_up() {
        let mut raw = [0u8; INODE_RECORD_SIZE];
        raw[0x04..0x08].copy_from_slice(&1025u32.to_le_bytes());
        let inode = Inode::parse(&raw);
        assert_eq!(inode.block_count(10), 2);
        assert_eq!(inode.block_count(12), 1);
    }
}
