//! In-memory ext2 images for tests.
//!
//! [`ImageBuilder`] lays out a small two-group volume: super block, one
//! descriptor block, both inode tables, then data blocks handed out in
//! allocation order. Indirect tables are only allocated on the paths that
//! actually map a block, so sparse files far into the triple indirect tier
//! stay small.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use pcboot_common::{DiskError, DiskIo, LINUX_PARTITION_TYPE, SECTOR_SIZE};

use crate::config::ROOT_INODE;
use crate::layout::inode::{N_BLOCKS, NDIR_BLOCKS, S_IFDIR, S_IFREG};
use crate::layout::superblock::{
    EXT2_SUPER_MAGIC, INCOMPAT_FILETYPE, REV_DYNAMIC, REV_GOOD_OLD, SUPER_BLOCK_OFFSET,
};

pub const GROUPS: u32 = 2;
const FIRST_INO: u32 = 11;
const DIR_FILE_TYPE: u8 = 2;
const REG_FILE_TYPE: u8 = 1;

#[derive(Debug, Clone, Copy)]
pub struct ImageOptions {
    pub block_size: usize,
    pub revision: u32,
    /// Ignored for revision 0, which always uses 128-byte inodes.
    pub inode_size: u16,
    pub inodes_per_group: u32,
    /// Set `INCOMPAT_FILETYPE` (revision 1 only).
    pub filetype: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            block_size: 1024,
            revision: REV_DYNAMIC,
            inode_size: 256,
            inodes_per_group: 32,
            filetype: true,
        }
    }
}

impl ImageOptions {
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }

    pub fn revision0() -> Self {
        Self {
            revision: REV_GOOD_OLD,
            inode_size: 128,
            filetype: false,
            ..Self::default()
        }
    }

    fn effective_inode_size(&self) -> usize {
        if self.revision == REV_GOOD_OLD {
            128
        } else {
            self.inode_size as usize
        }
    }

    fn has_filetype(&self) -> bool {
        self.revision != REV_GOOD_OLD && self.filetype
    }
}

struct PendingInode {
    mode: u16,
    size: u64,
    links: u16,
    i_block: [u32; N_BLOCKS],
    /// `(inode, name, file type)` records of a directory, in order.
    entries: Option<Vec<(u32, String, u8)>>,
}

pub struct ImageBuilder {
    opts: ImageOptions,
    image: Vec<u8>,
    first_data_block: u32,
    inode_tables: [u32; GROUPS as usize],
    next_block: u32,
    next_ino: [u32; GROUPS as usize],
    inodes: BTreeMap<u32, PendingInode>,
}

impl ImageBuilder {
    pub fn new(opts: ImageOptions) -> Self {
        assert!(opts.block_size.is_power_of_two() && opts.block_size >= 1024);
        let first_data_block = u32::from(opts.block_size == 1024);
        let mut builder = Self {
            opts,
            image: Vec::new(),
            first_data_block,
            inode_tables: [0; GROUPS as usize],
            next_block: 0,
            next_ino: [FIRST_INO, opts.inodes_per_group + 1],
            inodes: BTreeMap::new(),
        };
        // super block and descriptor table
        builder.grow_to(first_data_block + 2);

        let table_blocks = (opts.inodes_per_group as usize * opts.effective_inode_size())
            .div_ceil(opts.block_size) as u32;
        for group in 0..GROUPS as usize {
            builder.inode_tables[group] = builder.next_block;
            builder.grow_to(builder.next_block + table_blocks);
        }

        builder.inodes.insert(
            ROOT_INODE,
            PendingInode {
                mode: S_IFDIR | 0o755,
                size: 0,
                links: 2,
                i_block: [0; N_BLOCKS],
                entries: Some(vec![
                    (ROOT_INODE, ".".into(), DIR_FILE_TYPE),
                    (ROOT_INODE, "..".into(), DIR_FILE_TYPE),
                ]),
            },
        );
        builder
    }

    /// Pointers per indirect table.
    pub fn pointers_per_block(&self) -> u64 {
        (self.opts.block_size / 4) as u64
    }

    pub fn alloc_block(&mut self) -> u32 {
        let block = self.next_block;
        self.grow_to(block + 1);
        block
    }

    /// Add a regular file whose blocks are all allocated.
    ///
    /// Returns the inode number and the physical block of every logical block.
    pub fn add_file(&mut self, parent: u32, name: &str, data: &[u8]) -> (u32, Vec<u32>) {
        self.add_file_in_group(0, parent, name, data)
    }

    pub fn add_file_in_group(
        &mut self,
        group: usize,
        parent: u32,
        name: &str,
        data: &[u8],
    ) -> (u32, Vec<u32>) {
        let ino = self.alloc_ino(group);
        let mut i_block = [0u32; N_BLOCKS];
        let mut physical = Vec::new();
        for (logical, chunk) in data.chunks(self.opts.block_size).enumerate() {
            let block = self.alloc_block();
            self.write_block(block, chunk);
            self.map_block(&mut i_block, logical as u64, block);
            physical.push(block);
        }

        self.insert_file(ino, parent, name, data.len() as u64, i_block);
        (ino, physical)
    }

    /// Add a file of `size` bytes where only the listed logical blocks are
    /// allocated; everything else is a hole.
    pub fn add_sparse_file(
        &mut self,
        parent: u32,
        name: &str,
        size: u64,
        blocks: &[(u64, &[u8])],
    ) -> (u32, Vec<u32>) {
        let ino = self.alloc_ino(0);
        let mut i_block = [0u32; N_BLOCKS];
        let mut physical = Vec::new();
        for &(logical, data) in blocks {
            let block = self.alloc_block();
            self.write_block(block, data);
            self.map_block(&mut i_block, logical, block);
            physical.push(block);
        }

        self.insert_file(ino, parent, name, size, i_block);
        (ino, physical)
    }

    pub fn add_dir(&mut self, parent: u32, name: &str) -> u32 {
        let ino = self.alloc_ino(0);
        self.inodes.insert(
            ino,
            PendingInode {
                mode: S_IFDIR | 0o755,
                size: 0,
                links: 2,
                i_block: [0; N_BLOCKS],
                entries: Some(vec![
                    (ino, ".".into(), DIR_FILE_TYPE),
                    (parent, "..".into(), DIR_FILE_TYPE),
                ]),
            },
        );
        self.add_entry(parent, ino, name, DIR_FILE_TYPE);
        ino
    }

    /// Append a raw record to a directory, e.g. a deleted (inode 0) one.
    pub fn add_entry(&mut self, parent: u32, ino: u32, name: &str, file_type: u8) {
        let dir = self.inodes.get_mut(&parent).expect("parent inode exists");
        dir.entries
            .as_mut()
            .expect("parent is a directory")
            .push((ino, name.into(), file_type));
    }

    /// Write out directories and inodes, then place the volume behind an MBR
    /// at `start_sector` (no MBR when it is 0).
    pub fn finish(mut self, start_sector: u64) -> MemDisk {
        let dirs: Vec<u32> = self
            .inodes
            .iter()
            .filter(|(_, inode)| inode.entries.is_some())
            .map(|(&ino, _)| ino)
            .collect();
        for ino in dirs {
            self.write_dir(ino);
        }

        let inodes = core::mem::take(&mut self.inodes);
        for (ino, inode) in &inodes {
            self.write_inode(*ino, inode);
        }
        self.write_super_block();
        self.write_group_descs();

        let mut bytes = vec![0u8; start_sector as usize * SECTOR_SIZE];
        if start_sector > 0 {
            write_mbr(&mut bytes, start_sector as u32, self.image.len() / SECTOR_SIZE);
        }
        bytes.extend_from_slice(&self.image);
        MemDisk::new(bytes)
    }

    fn alloc_ino(&mut self, group: usize) -> u32 {
        let ino = self.next_ino[group];
        assert!(ino <= (group as u32 + 1) * self.opts.inodes_per_group, "group {} is full", group);
        self.next_ino[group] += 1;
        ino
    }

    fn insert_file(&mut self, ino: u32, parent: u32, name: &str, size: u64, i_block: [u32; N_BLOCKS]) {
        self.inodes.insert(
            ino,
            PendingInode {
                mode: S_IFREG | 0o644,
                size,
                links: 1,
                i_block,
                entries: None,
            },
        );
        self.add_entry(parent, ino, name, REG_FILE_TYPE);
    }

    fn grow_to(&mut self, blocks: u32) {
        if blocks > self.next_block {
            self.next_block = blocks;
            self.image.resize(blocks as usize * self.opts.block_size, 0);
        }
    }

    fn block_range(&self, block: u32) -> core::ops::Range<usize> {
        let start = block as usize * self.opts.block_size;
        start..start + self.opts.block_size
    }

    fn write_block(&mut self, block: u32, data: &[u8]) {
        let range = self.block_range(block);
        self.image[range.start..range.start + data.len()].copy_from_slice(data);
    }

    fn pointer(&self, table: u32, index: u64) -> u32 {
        let off = self.block_range(table).start + index as usize * 4;
        u32::from_le_bytes(self.image[off..off + 4].try_into().unwrap())
    }

    fn set_pointer(&mut self, table: u32, index: u64, value: u32) {
        let off = self.block_range(table).start + index as usize * 4;
        self.image[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Record `physical` as logical block `logical`, allocating indirect
    /// tables on the way.
    fn map_block(&mut self, i_block: &mut [u32; N_BLOCKS], logical: u64, physical: u32) {
        let per_table = self.pointers_per_block();
        if logical < NDIR_BLOCKS as u64 {
            i_block[logical as usize] = physical;
            return;
        }

        let mut rest = logical - NDIR_BLOCKS as u64;
        let mut slot = NDIR_BLOCKS;
        let mut height = 1u32;
        while rest >= per_table.pow(height) {
            rest -= per_table.pow(height);
            slot += 1;
            height += 1;
        }
        assert!(height <= 3, "logical block {} past the triple indirect tier", logical);

        if i_block[slot] == 0 {
            i_block[slot] = self.alloc_block();
        }
        let mut table = i_block[slot];
        for level in (1..height).rev() {
            let span = per_table.pow(level);
            let index = rest / span;
            rest %= span;
            let mut next = self.pointer(table, index);
            if next == 0 {
                next = self.alloc_block();
                self.set_pointer(table, index, next);
            }
            table = next;
        }
        self.set_pointer(table, rest, physical);
    }

    fn write_dir(&mut self, ino: u32) {
        let block_size = self.opts.block_size;
        let filetype = self.opts.has_filetype();
        let entries = self.inodes[&ino].entries.clone().unwrap_or_default();

        // Pack records; the last record of each block absorbs the slack.
        let mut blocks: Vec<Vec<u8>> = vec![Vec::new()];
        let mut last_start = 0usize;
        for (entry_ino, name, file_type) in &entries {
            let rec_len = (8 + name.len()).next_multiple_of(4);
            if blocks.last().unwrap().len() + rec_len > block_size {
                finish_dir_block(blocks.last_mut().unwrap(), last_start, block_size);
                blocks.push(Vec::new());
            }
            let block = blocks.last_mut().unwrap();
            last_start = block.len();
            block.extend_from_slice(&entry_ino.to_le_bytes());
            block.extend_from_slice(&(rec_len as u16).to_le_bytes());
            if filetype {
                block.extend_from_slice(&[name.len() as u8, *file_type]);
            } else {
                block.extend_from_slice(&(name.len() as u16).to_le_bytes());
            }
            block.extend_from_slice(name.as_bytes());
            block.resize(last_start + rec_len, 0);
        }
        finish_dir_block(blocks.last_mut().unwrap(), last_start, block_size);

        let mut i_block = [0u32; N_BLOCKS];
        for (logical, data) in blocks.iter().enumerate() {
            let block = self.alloc_block();
            self.write_block(block, data);
            self.map_block(&mut i_block, logical as u64, block);
        }

        let dir = self.inodes.get_mut(&ino).unwrap();
        dir.i_block = i_block;
        dir.size = (blocks.len() * block_size) as u64;
    }

    fn write_inode(&mut self, ino: u32, inode: &PendingInode) {
        let ipg = self.opts.inodes_per_group;
        let group = ((ino - 1) / ipg) as usize;
        let index = ((ino - 1) % ipg) as usize;
        let inode_size = self.opts.effective_inode_size();
        let off = self.block_range(self.inode_tables[group]).start + index * inode_size;
        let raw = &mut self.image[off..off + inode_size];

        raw[0x00..0x02].copy_from_slice(&inode.mode.to_le_bytes());
        raw[0x04..0x08].copy_from_slice(&(inode.size as u32).to_le_bytes());
        raw[0x1A..0x1C].copy_from_slice(&inode.links.to_le_bytes());
        for (i, block) in inode.i_block.iter().enumerate() {
            let at = 0x28 + i * 4;
            raw[at..at + 4].copy_from_slice(&block.to_le_bytes());
        }
        raw[0x6C..0x70].copy_from_slice(&((inode.size >> 32) as u32).to_le_bytes());
        if inode_size > 128 {
            raw[0x80..0x82].copy_from_slice(&32u16.to_le_bytes());
        }
    }

    fn write_super_block(&mut self) {
        let opts = self.opts;
        let blocks_per_group = 8 * opts.block_size as u32;
        let off = SUPER_BLOCK_OFFSET as usize;
        let sb = &mut self.image[off..off + 1024];

        put_u32(sb, 0x00, opts.inodes_per_group * GROUPS);
        put_u32(sb, 0x04, self.first_data_block + GROUPS * blocks_per_group);
        put_u32(sb, 0x14, self.first_data_block);
        put_u32(sb, 0x18, opts.block_size.trailing_zeros() - 10);
        put_u32(sb, 0x20, blocks_per_group);
        put_u32(sb, 0x28, opts.inodes_per_group);
        sb[0x38..0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
        put_u32(sb, 0x4C, opts.revision);
        if opts.revision != REV_GOOD_OLD {
            put_u32(sb, 0x54, FIRST_INO);
            sb[0x58..0x5A].copy_from_slice(&opts.inode_size.to_le_bytes());
            if opts.filetype {
                put_u32(sb, 0x60, INCOMPAT_FILETYPE);
            }
        }
    }

    fn write_group_descs(&mut self) {
        let table = self.block_range(self.first_data_block + 1).start;
        for group in 0..GROUPS as usize {
            let at = table + group * 32 + 8;
            self.image[at..at + 4].copy_from_slice(&self.inode_tables[group].to_le_bytes());
        }
    }
}

fn put_u32(raw: &mut [u8], at: usize, value: u32) {
    raw[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn finish_dir_block(block: &mut Vec<u8>, last_start: usize, block_size: usize) {
    if block.is_empty() {
        block.resize(block_size, 0);
        return;
    }
    let rec_len = (block_size - last_start) as u16;
    block[last_start + 4..last_start + 6].copy_from_slice(&rec_len.to_le_bytes());
    block.resize(block_size, 0);
}

fn write_mbr(disk: &mut [u8], start_sector: u32, sectors: usize) {
    let entry = 446;
    disk[entry] = 0x80;
    disk[entry + 4] = LINUX_PARTITION_TYPE;
    disk[entry + 8..entry + 12].copy_from_slice(&start_sector.to_le_bytes());
    disk[entry + 12..entry + 16].copy_from_slice(&(sectors as u32).to_le_bytes());
    disk[510] = 0x55;
    disk[511] = 0xAA;
}

/// Disk served from memory that counts read requests.
pub struct MemDisk {
    pub bytes: Vec<u8>,
    reads: Cell<usize>,
}

impl MemDisk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            reads: Cell::new(0),
        }
    }

    /// Number of `read_sectors` calls since creation or the last reset.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn reset_reads(&self) {
        self.reads.set(0);
    }
}

impl DiskIo for MemDisk {
    fn read_sectors(&self, drive: u8, sector: u64, buffer: &mut [u8]) -> Result<(), DiskError> {
        if drive != 0x80 {
            return Err(DiskError::NoDevice);
        }
        let start = sector as usize * SECTOR_SIZE;
        let end = start + buffer.len();
        if end > self.bytes.len() {
            return Err(DiskError::OutOfRange);
        }
        self.reads.set(self.reads.get() + 1);
        buffer.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }
}
