/// Bytes per BIOS disk sector.
pub const SECTOR_SIZE: usize = 512;
pub const SECTOR_SIZE_LOG2: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// The firmware reported a failed transfer.
    Io,
    /// The requested sector lies outside the device.
    OutOfRange,
    /// No drive answers to the given number.
    NoDevice,
    /// A sector that should carry the 0xAA55 boot signature does not.
    BadSignature,
}

/// Sector-granular access to a firmware disk.
///
/// Reads are synchronous. Implementations backed by the BIOS issue one
/// request per sector; test implementations serve from memory.
pub trait DiskIo {
    /// Read `buffer.len() / SECTOR_SIZE` sectors starting at `sector`.
    ///
    /// `buffer.len()` must be a multiple of [`SECTOR_SIZE`].
    fn read_sectors(&self, drive: u8, sector: u64, buffer: &mut [u8]) -> Result<(), DiskError>;

    /// Read `buffer.len()` bytes starting at the absolute byte `offset`.
    ///
    /// Meant for small structures that may straddle a sector boundary, so
    /// every sector goes through a single 512-byte bounce buffer.
    fn read_bytes(&self, drive: u8, offset: u64, buffer: &mut [u8]) -> Result<(), DiskError> {
        let mut sector_buf = [0u8; SECTOR_SIZE];
        let mut sector = offset >> SECTOR_SIZE_LOG2;
        let mut offset_in_sector = (offset & (SECTOR_SIZE as u64 - 1)) as usize;
        let mut written = 0usize;

        while written < buffer.len() {
            self.read_sectors(drive, sector, &mut sector_buf)?;

            let to_copy = core::cmp::min(buffer.len() - written, SECTOR_SIZE - offset_in_sector);
            buffer[written..written + to_copy]
                .copy_from_slice(&sector_buf[offset_in_sector..offset_in_sector + to_copy]);

            written += to_copy;
            sector += 1;
            offset_in_sector = 0;
        }

        Ok(())
    }
}

impl<T: DiskIo + ?Sized> DiskIo for &T {
    fn read_sectors(&self, drive: u8, sector: u64, buffer: &mut [u8]) -> Result<(), DiskError> {
        (**self).read_sectors(drive, sector, buffer)
    }

    fn read_bytes(&self, drive: u8, offset: u64, buffer: &mut [u8]) -> Result<(), DiskError> {
        (**self).read_bytes(drive, offset, buffer)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::{DiskError, DiskIo, SECTOR_SIZE};

    struct PatternDisk {
        sectors: u64,
        reads: Cell<usize>,
    }

    impl DiskIo for PatternDisk {
        fn read_sectors(
            &self,
            _drive: u8,
            sector: u64,
            buffer: &mut [u8],
        ) -> Result<(), DiskError> {
            let count = (buffer.len() / SECTOR_SIZE) as u64;
            if sector + count > self.sectors {
                return Err(DiskError::OutOfRange);
            }
            for (i, byte) in buffer.iter_mut().enumerate() {
                let absolute = sector * SECTOR_SIZE as u64 + i as u64;
                *byte = (absolute % 251) as u8;
            }
            self.reads.set(self.reads.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_read_bytes_straddling_sectors() {
        let disk = PatternDisk {
            sectors: 8,
            reads: Cell::new(0),
        };
        let mut buf = [0u8; 600];
        disk.read_bytes(0x80, 500, &mut buf).unwrap();

        for (i, byte) in buf.iter().enumerate() {
            assert_eq!(*byte, ((500 + i) % 251) as u8);
        }
        // 500..1100 touches sectors 0, 1 and 2
        assert_eq!(disk.reads.get(), 3);
    }

    #[test]
    fn test_read_bytes_empty_buffer_issues_no_read() {
        let disk = PatternDisk {
            sectors: 1,
            reads: Cell::new(0),
        };
        disk.read_bytes(0x80, 4096, &mut []).unwrap();
        assert_eq!(disk.reads.get(), 0);
    }

    #[test]
    fn test_read_bytes_past_end_fails() {
        let disk = PatternDisk {
            sectors: 2,
            reads: Cell::new(0),
        };
        let mut buf = [0u8; 16];
        assert_eq!(
            disk.read_bytes(0x80, 1020, &mut buf),
            Err(DiskError::OutOfRange)
        );
    }
}
