use pcboot_common::DiskError;

/// Unified error type for pcboot-ext2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ext2Error {
    /// The disk read failed
    Io(DiskError),
    /// Super block magic is not 0xEF53
    InvalidMagic,
    /// Block size (in bytes) larger than the traversal buffers
    UnsupportedBlockSize(u32),
    /// Corrupted filesystem metadata
    CorruptedFs(&'static str),
    /// Inode number 0 or past `s_inodes_count`
    InvalidInode(u32),
    /// File or directory not found
    NotFound,
    /// Expected directory inode but got other type
    NotDirectory,
    /// File size exceeds what the block map can address
    FileTooLarge,
    /// Image does not fit into the configured load segments
    ImageTooLarge,
    /// No partition of type 0x83 in the partition table
    NoLinuxPartition,
}

impl From<DiskError> for Ext2Error {
    fn from(err: DiskError) -> Self {
        Ext2Error::Io(err)
    }
}

/// Convenience Result type alias.
pub type Result<T> = ::core::result::Result<T, Ext2Error>;
