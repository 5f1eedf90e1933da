use log::debug;
use pcboot_common::DiskIo;

use crate::config::ROOT_INODE;
use crate::error::{Ext2Error, Result};
use crate::fs_core::dir_reader::DirReader;
use crate::fs_core::inode_reader::InodeReader;
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::fs_core::traversal::TraversalContext;
use crate::io::block_reader::BlockReader;

/// Path resolver: convert absolute paths into inode numbers.
///
/// Symbolic links are not followed; a symlink in the middle of a path
/// fails like any other non-directory.
pub struct PathResolver;

impl PathResolver {
    /// Resolve an absolute path to an inode number.
    ///
    /// Empty components and `.` are skipped; `..` is looked up like any
    /// other name, which works because every directory stores it.
    pub fn resolve<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        ctx: &mut TraversalContext,
        path: &str,
    ) -> Result<u32> {
        if !path.starts_with('/') {
            return Err(Ext2Error::CorruptedFs("path must be absolute"));
        }

        let mut current_ino = ROOT_INODE;
        for component in Self::components(path) {
            let current_inode = InodeReader::read_inode(reader, super_block_manager, current_ino)?;
            current_ino = DirReader::lookup(
                reader,
                super_block_manager,
                ctx,
                &current_inode,
                component.as_bytes(),
            )?
            .ok_or(Ext2Error::NotFound)?;
        }

        debug!("resolved {} to inode {}", path, current_ino);
        Ok(current_ino)
    }

    fn components(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|c| !c.is_empty() && *c != ".")
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::PathResolver;

    #[test]
    fn test_components_skip_empty_and_dot() {
        let parts: Vec<&str> = PathResolver::components("//boot/./memtest86+.bin/").collect();
        assert_eq!(parts, ["boot", "memtest86+.bin"]);
    }
}
