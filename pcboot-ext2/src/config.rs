use crate::fs_core::boot_image::LoadSegment;

/// Largest block size the traversal buffers can hold
pub const MAX_BLOCK_SIZE: usize = 4096;

/// Root directory inode number
pub const ROOT_INODE: u32 = 2;

// Boot image configuration

/// File loaded from the root directory of the boot partition
pub static BOOT_FILENAME: &str = "memtest86+.bin";

/// Number of leading 512-byte sectors (boot sector + setup code) that must
/// stay below 1 MiB next to the real-mode stack
pub const SETUP_SECTORS: u64 = 5;

/// Where the boot sector and setup sectors are staged
pub const LOW_STAGING_ADDRESS: u64 = 0x9_0000;

/// Where the rest of the image is loaded
pub const HIGH_LOAD_ADDRESS: u64 = 0x1_0000;

/// Ordered load segments for the boot image: the setup sectors go to the
/// staging area, everything after them to the high load address.
pub static BOOT_SEGMENTS: &[LoadSegment] = &[
    LoadSegment {
        destination: LOW_STAGING_ADDRESS,
        length: Some(SETUP_SECTORS * 512),
    },
    LoadSegment {
        destination: HIGH_LOAD_ADDRESS,
        length: None,
    },
];
