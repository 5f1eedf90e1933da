use core::ops::ControlFlow;

use log::{debug, warn};
use pcboot_common::PhysicalMemory;

use crate::error::{Ext2Error, Result};

/// One destination region of a boot image.
///
/// Segments are filled in order; a segment with no length takes the rest
/// of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    pub destination: u64,
    pub length: Option<u64>,
}

/// Outcome of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Bytes copied into memory, which equals the file size.
    pub bytes_loaded: u64,
    /// Chunks that were divided between two segments.
    pub splits: u32,
}

/// Streaming consumer that places a file into physical memory.
///
/// Placement is driven only by the number of bytes consumed so far, so a
/// chunk that crosses a segment boundary is split: the head finishes the
/// current segment and the tail starts the next one.
pub struct BootImageLoader<'s, M: PhysicalMemory> {
    memory: M,
    segments: &'s [LoadSegment],
    segment: usize,
    offset_in_segment: u64,
    consumed: u64,
    splits: u32,
    overflowed: bool,
}

impl<'s, M: PhysicalMemory> BootImageLoader<'s, M> {
    pub fn new(memory: M, segments: &'s [LoadSegment]) -> Self {
        Self {
            memory,
            segments,
            segment: 0,
            offset_in_segment: 0,
            consumed: 0,
            splits: 0,
            overflowed: false,
        }
    }

    /// Copy one chunk to its destination.
    ///
    /// Breaks when the image does not fit the segments.
    pub fn consume(&mut self, mut chunk: &[u8]) -> ControlFlow<()> {
        while !chunk.is_empty() {
            let Some(segment) = self.segments.get(self.segment).copied() else {
                warn!("boot image exceeds load segments at byte {}", self.consumed);
                self.overflowed = true;
                return ControlFlow::Break(());
            };

            let room = segment
                .length
                .map_or(u64::MAX, |len| len - self.offset_in_segment);
            if room == 0 {
                self.next_segment();
                continue;
            }

            let len = core::cmp::min(room, chunk.len() as u64) as usize;
            let address = segment.destination + self.offset_in_segment;
            self.memory.write(address, &chunk[..len]);
            self.offset_in_segment += len as u64;
            self.consumed += len as u64;

            if len < chunk.len() {
                debug!(
                    "boot image: split at byte {}, {} bytes to {:#x}, {} to the next segment",
                    self.consumed,
                    len,
                    address,
                    chunk.len() - len,
                );
                self.splits += 1;
            }
            if segment.length == Some(self.offset_in_segment) {
                self.next_segment();
            }
            chunk = &chunk[len..];
        }

        ControlFlow::Continue(())
    }

    pub fn finish(self) -> Result<LoadReport> {
        if self.overflowed {
            return Err(Ext2Error::ImageTooLarge);
        }
        Ok(LoadReport {
            bytes_loaded: self.consumed,
            splits: self.splits,
        })
    }

    fn next_segment(&mut self) {
        self.segment += 1;
        self.offset_in_segment = 0;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;
    use core::ops::ControlFlow;

    use pcboot_common::PhysicalMemory;

    use super::{BootImageLoader, LoadSegment};
    use crate::error::Ext2Error;

    /// Records every write as (address, bytes).
    #[derive(Default)]
    struct WriteLog {
        writes: Vec<(u64, Vec<u8>)>,
    }

    impl PhysicalMemory for WriteLog {
        fn write(&mut self, address: u64, bytes: &[u8]) {
            self.writes.push((address, bytes.to_vec()));
        }
    }

    const SEGMENTS: &[LoadSegment] = &[
        LoadSegment {
            destination: 0x9_0000,
            length: Some(2560),
        },
        LoadSegment {
            destination: 0x1_0000,
            length: None,
        },
    ];

    #[test]
    fn test_chunk_straddling_boundary_is_split_once() {
        let mut log = WriteLog::default();
        let mut loader = BootImageLoader::new(&mut log, SEGMENTS);
        for fill in 0..4u8 {
            assert_eq!(loader.consume(&[fill; 1024]), ControlFlow::Continue(()));
        }
        let report = loader.finish().unwrap();
        assert_eq!(report.bytes_loaded, 4096);
        assert_eq!(report.splits, 1);

        let placed: Vec<(u64, usize)> = log.writes.iter().map(|(a, b)| (*a, b.len())).collect();
        assert_eq!(
            placed,
            vec![
                (0x9_0000, 1024),
                (0x9_0400, 1024),
                (0x9_0800, 512),
                (0x1_0000, 512),
                (0x1_0200, 1024),
            ]
        );
        assert!(log.writes[3].1.iter().all(|&b| b == 2));
    }

    #[test]
    fn test_boundary_on_chunk_edge_needs_no_split() {
        let segments = [
            LoadSegment {
                destination: 0x1000,
                length: Some(1024),
            },
            LoadSegment {
                destination: 0x8000,
                length: None,
            },
        ];
        let mut log = WriteLog::default();
        let mut loader = BootImageLoader::new(&mut log, &segments);
        let _ = loader.consume(&[1; 1024]);
        let _ = loader.consume(&[2; 100]);
        assert_eq!(loader.finish().unwrap().splits, 0);
        assert_eq!(log.writes[1].0, 0x8000);
    }

    #[test]
    fn test_overflow_breaks_and_fails() {
        let segments = [LoadSegment {
            destination: 0x1000,
            length: Some(10),
        }];
        let mut log = WriteLog::default();
        let mut loader = BootImageLoader::new(&mut log, &segments);
        assert_eq!(loader.consume(&[0; 16]), ControlFlow::Break(()));
        assert_eq!(loader.finish(), Err(Ext2Error::ImageTooLarge));
    }
}
