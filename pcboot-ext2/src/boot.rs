use log::{info, warn};
use pcboot_common::{DiskIo, LINUX_PARTITION_TYPE, PartitionTable, PhysicalMemory, SECTOR_SIZE};
use spin::Mutex;

use crate::config::{BOOT_FILENAME, BOOT_SEGMENTS};
use crate::error::{Ext2Error, Result};
use crate::fs::Ext2Volume;
use crate::fs_core::boot_image::{LoadReport, LoadSegment};
use crate::fs_core::traversal::TraversalContext;

/// Traversal buffers of the boot path, kept out of the small real-mode stack.
pub static BOOT_CONTEXT: Mutex<TraversalContext> = Mutex::new(TraversalContext::new());

/// Load the configured boot image from `drive` into `memory`.
///
/// Uses [`BOOT_FILENAME`], [`BOOT_SEGMENTS`] and the shared [`BOOT_CONTEXT`].
pub fn load_boot_image<D, M>(disk: &D, drive: u8, memory: &mut M) -> Result<LoadReport>
where
    D: DiskIo,
    M: PhysicalMemory,
{
    let mut ctx = BOOT_CONTEXT.lock();
    load_from_partition_table(disk, drive, &mut ctx, BOOT_FILENAME, memory, BOOT_SEGMENTS)
}

/// Load `filename` from the first Linux partition of `drive` that holds it.
///
/// Partitions of type 0x83 are tried in table order. A partition that is not
/// ext2 or lacks the file is skipped; the last failure is returned when none
/// succeeds.
pub fn load_from_partition_table<D, M>(
    disk: &D,
    drive: u8,
    ctx: &mut TraversalContext,
    filename: &str,
    memory: &mut M,
    segments: &[LoadSegment],
) -> Result<LoadReport>
where
    D: DiskIo,
    M: PhysicalMemory,
{
    let mut sector = [0u8; SECTOR_SIZE];
    disk.read_sectors(drive, 0, &mut sector)?;
    let table = PartitionTable::parse(&sector)?;

    let mut last_err = Ext2Error::NoLinuxPartition;
    for entry in table.of_type(LINUX_PARTITION_TYPE) {
        info!("trying partition at lba {}", entry.lba_start);
        let loaded = Ext2Volume::open(disk, drive, entry.lba_start as u64)
            .and_then(|volume| volume.load_file(&mut *ctx, filename, &mut *memory, segments));
        match loaded {
            Ok(report) => return Ok(report),
            Err(err) => {
                warn!("partition at lba {}: {:?}", entry.lba_start, err);
                last_err = err;
            }
        }
    }

    Err(last_err)
}
