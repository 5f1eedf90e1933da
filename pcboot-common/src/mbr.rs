use log::debug;

use crate::disk::{DiskError, SECTOR_SIZE};

/// Partition type byte used for Linux native (ext2) partitions.
pub const LINUX_PARTITION_TYPE: u8 = 0x83;

const PARTITION_TABLE_OFFSET: usize = 446;
const PARTITION_ENTRY_SIZE: usize = 16;
const BOOT_SIGNATURE_OFFSET: usize = 510;
const BOOT_SIGNATURE: u16 = 0xAA55;

/// One primary entry of a classic MBR partition table.
///
/// The CHS fields are ignored; only LBA addressing is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub active: bool,
    pub partition_type: u8,
    pub lba_start: u32,
    pub lba_count: u32,
}

impl PartitionEntry {
    fn parse(raw: &[u8]) -> Self {
        PartitionEntry {
            active: raw[0] == 0x80,
            partition_type: raw[4],
            lba_start: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            lba_count: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partition_type == 0
    }
}

/// The four primary entries of sector 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTable {
    pub entries: [PartitionEntry; 4],
}

impl PartitionTable {
    /// Parse the partition table from the raw boot sector.
    pub fn parse(sector: &[u8; SECTOR_SIZE]) -> Result<Self, DiskError> {
        let signature = u16::from_le_bytes([
            sector[BOOT_SIGNATURE_OFFSET],
            sector[BOOT_SIGNATURE_OFFSET + 1],
        ]);
        if signature != BOOT_SIGNATURE {
            return Err(DiskError::BadSignature);
        }

        let entries = core::array::from_fn(|i| {
            let off = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
            PartitionEntry::parse(&sector[off..off + PARTITION_ENTRY_SIZE])
        });
        debug!("mbr: {:?}", entries);

        Ok(PartitionTable { entries })
    }

    /// Entries with the given type byte, in table order.
    pub fn of_type(&self, partition_type: u8) -> impl Iterator<Item = &PartitionEntry> {
        self.entries
            .iter()
            .filter(move |e| e.partition_type == partition_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{LINUX_PARTITION_TYPE, PartitionTable};
    use crate::disk::{DiskError, SECTOR_SIZE};

    fn boot_sector(entries: &[(usize, u8, u32, u32)]) -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        for &(slot, kind, start, count) in entries {
            let off = 446 + slot * 16;
            sector[off + 4] = kind;
            sector[off + 8..off + 12].copy_from_slice(&start.to_le_bytes());
            sector[off + 12..off + 16].copy_from_slice(&count.to_le_bytes());
        }
        sector[510] = 0x55;
        sector[511] = 0xAA;
        sector
    }

    #[test]
    fn test_parse_finds_linux_partitions_in_order() {
        let sector = boot_sector(&[(0, 0x0C, 63, 100), (1, 0x83, 2048, 4096), (3, 0x83, 8192, 1)]);
        let table = PartitionTable::parse(&sector).unwrap();

        let starts: Vec<u32> = table
            .of_type(LINUX_PARTITION_TYPE)
            .map(|e| e.lba_start)
            .collect();
        assert_eq!(starts, vec![2048, 8192]);
        assert!(table.entries[2].is_empty());
        assert_eq!(table.entries[1].lba_count, 4096);
    }

    #[test]
    fn test_parse_rejects_missing_signature() {
        let mut sector = boot_sector(&[]);
        sector[511] = 0;
        assert_eq!(PartitionTable::parse(&sector), Err(DiskError::BadSignature));
    }
}
