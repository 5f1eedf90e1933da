use core::ops::{ControlFlow, Range};

use pcboot_common::DiskIo;

use crate::error::{Ext2Error, Result};
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::fs_core::traversal::IndirectTables;
use crate::io::block_reader::BlockReader;
use crate::layout::inode::{IND_BLOCK, N_BLOCKS, NDIR_BLOCKS};
use crate::layout::read_u32_le;

/// Block map walker.
///
/// Resolves logical file blocks through the direct / indirect / double /
/// triple indirect pointer tree. A single primitive serves both the point
/// lookup (a one-block range) and the full-file walk; only the pointer
/// tables on the path to the requested range are read.
///
/// A zero pointer is a hole: it is reported as physical block 0 and nothing
/// below it is read.
pub struct BlockMapper;

impl BlockMapper {
    /// Number of logical blocks the tree can address.
    ///
    /// `12 + C + C^2 + C^3` with `C = 2^pointers_per_block_log2`.
    pub fn capacity(pointers_per_block_log2: u32) -> u64 {
        (1..=3u32).fold(NDIR_BLOCKS as u64, |acc, height| {
            acc + (1u64 << (pointers_per_block_log2 * height))
        })
    }

    /// Visit `(logical, physical)` for every logical block in `range`, in
    /// ascending logical order.
    ///
    /// Stops as soon as `visit` breaks and returns `Break`; no further block
    /// is read after that.
    pub fn walk<D, F>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        tables: &mut IndirectTables,
        i_block: &[u32; N_BLOCKS],
        range: Range<u64>,
        visit: &mut F,
    ) -> Result<ControlFlow<()>>
    where
        D: DiskIo,
        F: FnMut(u64, u32) -> Result<ControlFlow<()>>,
    {
        let pointers_log2 = super_block_manager.pointers_per_block_log2();
        if range.end > Self::capacity(pointers_log2) {
            return Err(Ext2Error::FileTooLarge);
        }
        if range.start >= range.end {
            return Ok(ControlFlow::Continue(()));
        }

        let direct_end = core::cmp::min(range.end, NDIR_BLOCKS as u64);
        for logical in range.start..direct_end {
            if visit(logical, i_block[logical as usize])?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }

        let mut base = NDIR_BLOCKS as u64;
        for height in 1..=3u32 {
            let span = 1u64 << (pointers_log2 * height);
            if range.start < base + span && range.end > base {
                let root = i_block[IND_BLOCK + height as usize - 1];
                let flow = Self::walk_table(
                    reader,
                    super_block_manager,
                    tables,
                    height,
                    root,
                    base,
                    &range,
                    visit,
                )?;
                if flow.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
            base += span;
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Resolve one logical block to its volume block number (0 for a hole).
    pub fn lookup<D: DiskIo>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        tables: &mut IndirectTables,
        i_block: &[u32; N_BLOCKS],
        logical: u64,
    ) -> Result<u32> {
        let end = logical.checked_add(1).ok_or(Ext2Error::FileTooLarge)?;
        let mut found = 0u32;
        let _flow = Self::walk(
            reader,
            super_block_manager,
            tables,
            i_block,
            logical..end,
            &mut |_logical: u64, physical: u32| {
                found = physical;
                Ok(ControlFlow::Break(()))
            },
        )?;
        Ok(found)
    }

    /// Walk the subtree rooted at the pointer table `table_block` of the
    /// given height, which covers logical blocks `base..base + C^height`.
    #[allow(clippy::too_many_arguments)]
    fn walk_table<D, F>(
        reader: &BlockReader<D>,
        super_block_manager: &SuperBlockManager,
        tables: &mut IndirectTables,
        height: u32,
        table_block: u32,
        base: u64,
        range: &Range<u64>,
        visit: &mut F,
    ) -> Result<ControlFlow<()>>
    where
        D: DiskIo,
        F: FnMut(u64, u32) -> Result<ControlFlow<()>>,
    {
        let pointers_log2 = super_block_manager.pointers_per_block_log2();
        let child_shift = pointers_log2 * (height - 1);
        let start = core::cmp::max(range.start, base);
        let end = core::cmp::min(range.end, base + (1u64 << (pointers_log2 * height)));

        if table_block == 0 {
            for logical in start..end {
                if visit(logical, 0)?.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
            return Ok(ControlFlow::Continue(()));
        }

        let block_size = super_block_manager.block_size;
        reader.read_block(table_block, &mut tables.table_mut(height)[..block_size])?;

        // child = ((logical - base) >> (log2(C) * (height - 1))) & (C - 1)
        let first = ((start - base) >> child_shift) as usize;
        let last = ((end - 1 - base) >> child_shift) as usize;
        for child in first..=last {
            let pointer = read_u32_le(tables.table(height), child * 4);
            let child_base = base + ((child as u64) << child_shift);

            let flow = if height == 1 {
                visit(child_base, pointer)?
            } else {
                Self::walk_table(
                    reader,
                    super_block_manager,
                    tables,
                    height - 1,
                    pointer,
                    child_base,
                    range,
                    visit,
                )?
            };
            if flow.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }

        Ok(ControlFlow::Continue(()))
    }
}
