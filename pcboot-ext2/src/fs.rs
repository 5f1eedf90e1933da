use alloc::vec::Vec;
use core::ops::ControlFlow;

use log::{info, warn};
use pcboot_common::{DiskIo, PhysicalMemory};

use crate::error::{Ext2Error, Result};
use crate::fs_core::block_map::BlockMapper;
use crate::fs_core::boot_image::{BootImageLoader, LoadReport, LoadSegment};
use crate::fs_core::dir_reader::DirReader;
use crate::fs_core::file_reader::FileReader;
use crate::fs_core::inode_reader::InodeReader;
use crate::fs_core::path_resolver::PathResolver;
use crate::fs_core::superblock_manager::SuperBlockManager;
use crate::fs_core::traversal::{IndirectTables, TraversalContext};
use crate::io::block_reader::BlockReader;
use crate::layout::dir_entry::DirEntry;
use crate::layout::inode::Inode;

/// Read-only ext2 volume that wires all modules together.
///
/// Operations that walk a block tree borrow a [`TraversalContext`] from the
/// caller, so the volume itself holds no scratch memory.
pub struct Ext2Volume<D: DiskIo> {
    reader: BlockReader<D>,
    pub sb_manager: SuperBlockManager,
}

impl<D: DiskIo> Ext2Volume<D> {
    /// Open the ext2 filesystem on the partition starting at `start_sector`.
    pub fn open(disk: D, drive: u8, start_sector: u64) -> Result<Self> {
        let mut reader = BlockReader::new(disk, drive, start_sector);
        let sb_manager = SuperBlockManager::load(&reader)?;
        reader.set_block_size_log2(sb_manager.block_size_log2);

        info!(
            "ext2: drive {:#x} sector {}: {} blocks of {} bytes, {} groups",
            drive,
            start_sector,
            sb_manager.super_block.s_blocks_count,
            sb_manager.block_size,
            sb_manager.group_count,
        );
        Ok(Self { reader, sb_manager })
    }

    pub fn reader(&self) -> &BlockReader<D> {
        &self.reader
    }

    pub fn read_inode(&self, ino: u32) -> Result<Inode> {
        InodeReader::read_inode(&self.reader, &self.sb_manager, ino)
    }

    /// Volume block number holding logical block `index` of inode `ino`
    /// (0 for a hole).
    pub fn inode_block(&self, ino: u32, index: u64) -> Result<u32> {
        let inode = self.read_inode(ino)?;
        let mut tables = IndirectTables::new();
        BlockMapper::lookup(
            &self.reader,
            &self.sb_manager,
            &mut tables,
            &inode.i_block,
            index,
        )
    }

    /// Stream the contents of `inode` to `consume`, one block-sized chunk at
    /// a time.
    pub fn stream<F>(
        &self,
        ctx: &mut TraversalContext,
        inode: &Inode,
        consume: F,
    ) -> Result<ControlFlow<()>>
    where
        F: FnMut(&[u8]) -> ControlFlow<()>,
    {
        FileReader::stream(&self.reader, &self.sb_manager, ctx, inode, consume)
    }

    pub fn read(
        &self,
        ctx: &mut TraversalContext,
        ino: u32,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        let inode = self.read_inode(ino)?;
        FileReader::read(&self.reader, &self.sb_manager, ctx, &inode, offset, buf)
    }

    pub fn read_dir(&self, ctx: &mut TraversalContext, ino: u32) -> Result<Vec<DirEntry>> {
        let inode = self.read_inode(ino)?;
        DirReader::read_dir_entries(&self.reader, &self.sb_manager, ctx, &inode)
    }

    /// Inode number of `name` in directory `parent`, if present.
    pub fn lookup(
        &self,
        ctx: &mut TraversalContext,
        parent: u32,
        name: &str,
    ) -> Result<Option<u32>> {
        let parent_inode = self.read_inode(parent)?;
        DirReader::lookup(
            &self.reader,
            &self.sb_manager,
            ctx,
            &parent_inode,
            name.as_bytes(),
        )
    }

    pub fn resolve_path(&self, ctx: &mut TraversalContext, path: &str) -> Result<u32> {
        PathResolver::resolve(&self.reader, &self.sb_manager, ctx, path)
    }

    /// Find `filename` in the root directory and copy it into `memory`
    /// according to `segments`.
    pub fn load_file<M: PhysicalMemory>(
        &self,
        ctx: &mut TraversalContext,
        filename: &str,
        memory: M,
        segments: &[LoadSegment],
    ) -> Result<LoadReport> {
        let root = InodeReader::read_root_inode(&self.reader, &self.sb_manager)?;
        let Some(ino) = DirReader::lookup(
            &self.reader,
            &self.sb_manager,
            ctx,
            &root,
            filename.as_bytes(),
        )?
        else {
            warn!("{} not found in the root directory", filename);
            return Err(Ext2Error::NotFound);
        };
        let inode = self.read_inode(ino)?;
        if !inode.is_file() {
            warn!(
                "{} (inode {}, mode {:#o}) is not a regular file",
                filename, ino, inode.i_mode
            );
        }
        info!("loading {} (inode {}, {} bytes)", filename, ino, inode.i_size);

        let mut loader = BootImageLoader::new(memory, segments);
        let _flow = self.stream(ctx, &inode, |chunk| loader.consume(chunk))?;
        let report = loader.finish()?;

        info!(
            "loaded {} bytes of {}, {} split chunk(s)",
            report.bytes_loaded, filename, report.splits
        );
        Ok(report)
    }
}
