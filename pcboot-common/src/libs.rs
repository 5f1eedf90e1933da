#![cfg_attr(not(test), no_std)]

pub mod disk;
pub mod mbr;
pub mod mem;

pub use disk::{DiskError, DiskIo, SECTOR_SIZE, SECTOR_SIZE_LOG2};
pub use mbr::{LINUX_PARTITION_TYPE, PartitionEntry, PartitionTable};
pub use mem::{IdentityMappedMemory, PhysicalMemory};
