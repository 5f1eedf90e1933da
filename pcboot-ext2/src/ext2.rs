#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod boot;
pub mod config;
pub mod error;
pub mod fs;
pub mod io;
pub mod layout;

// The module lives in `core/`, but that name shadows the `core` crate.
// We use `#[path]` so the directory stays `core/` while the Rust module is `fs_core`.
#[path = "core/mod.rs"]
pub mod fs_core;

#[cfg(test)]
mod test_image;
#[cfg(test)]
mod tests;

// Re-exports
pub use boot::{BOOT_CONTEXT, load_boot_image, load_from_partition_table};
pub use error::Ext2Error;
pub use fs::Ext2Volume;
pub use fs_core::block_group_manager::{BlockGroupManager, InodeLocation};
pub use fs_core::block_map::BlockMapper;
pub use fs_core::boot_image::{BootImageLoader, LoadReport, LoadSegment};
pub use fs_core::dir_reader::{DirReader, DirScan};
pub use fs_core::file_reader::FileReader;
pub use fs_core::inode_reader::InodeReader;
pub use fs_core::path_resolver::PathResolver;
pub use fs_core::superblock_manager::SuperBlockManager;
pub use fs_core::traversal::{IndirectTables, TraversalContext};
pub use io::block_reader::BlockReader;
pub use layout::block_group::BlockGroupDesc;
pub use layout::dir_entry::{DirEntry, DirEntryFormat, DirRecord, DirRecords, FileType};
pub use layout::inode::Inode;
pub use layout::superblock::SuperBlock;
