use core::ops::ControlFlow;

use log::debug;
use pcboot_common::DiskIo;

use crate::error::Result;
use crate::fs_core::block_map::BlockMapper;
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::fs_core::traversal::TraversalContext;
use crate::io::block_reader::BlockReader;
use crate::layout::inode::Inode;

/// File data reader.
///
/// Reads bytes from a file inode by resolving logical blocks through the
/// block map. Holes read as zeros without touching the disk.
pub struct FileReader;

impl FileReader {
    /// Deliver the whole file to `consume`, one chunk per logical block.
    ///
    /// Every chunk is exactly one block except the last, which is
    /// `i_size - (block_count - 1) * block_size` bytes. The chunk borrows the
    /// context's leaf buffer and is only valid during the call.
    ///
    /// Returns `Break` if `consume` asked to stop; nothing is read after that.
    pub fn stream<D, F>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        ctx: &mut TraversalContext,
        inode: &Inode,
        mut consume: F,
    ) -> Result<ControlFlow<()>>
    where
        D: DiskIo,
        F: FnMut(&[u8]) -> ControlFlow<()>,
    {
        let block_size = super_block_manager.block_size;
        let block_count = inode.block_count(super_block_manager.block_size_log2);
        debug!("stream: {} bytes in {} blocks", inode.i_size, block_count);

        let mut remaining = inode.i_size;
        let (tables, leaf) = ctx.split();
        BlockMapper::walk(
            reader,
            super_block_manager,
            tables,
            &inode.i_block,
            0..block_count,
            &mut |_logical: u64, physical: u32| {
                let block = &mut leaf[..block_size];
                Self::fill_block(reader, physical, block)?;

                let len = core::cmp::min(remaining, block_size as u64) as usize;
                remaining -= len as u64;
                Ok(consume(&block[..len]))
            },
        )
    }

    /// Read file bytes at `offset` into `buf`.
    ///
    /// Returns the number of bytes actually read (EOF-aware).
    pub fn read<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        ctx: &mut TraversalContext,
        inode: &Inode,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        if buf.is_empty() || offset >= inode.i_size {
            return Ok(0);
        }

        let block_size = super_block_manager.block_size;
        let block_size_log2 = super_block_manager.block_size_log2;
        let to_read = core::cmp::min(buf.len() as u64, inode.i_size - offset) as usize;
        let first_block = offset >> block_size_log2;
        let end_block = (offset + to_read as u64).div_ceil(block_size as u64);

        let mut copied = 0usize;
        let mut offset_in_block = (offset & (block_size as u64 - 1)) as usize;
        let (tables, leaf) = ctx.split();
        let _flow = BlockMapper::walk(
            reader,
            super_block_manager,
            tables,
            &inode.i_block,
            first_block..end_block,
            &mut |_logical: u64, physical: u32| {
                let block = &mut leaf[..block_size];
                Self::fill_block(reader, physical, block)?;

                let in_this_block = core::cmp::min(block_size - offset_in_block, to_read - copied);
                buf[copied..copied + in_this_block]
                    .copy_from_slice(&block[offset_in_block..offset_in_block + in_this_block]);
                copied += in_this_block;
                offset_in_block = 0;
                Ok(ControlFlow::Continue(()))
            },
        )?;

        Ok(copied)
    }

    fn fill_block<D: DiskIo>(reader: &BlockReader<D>, physical: u32, block: &mut [u8]) -> Result<()> {
        if physical == 0 {
            // sparse hole
            block.fill(0);
            Ok(())
        } else {
            reader.read_block(physical, block)
        }
    }
}
