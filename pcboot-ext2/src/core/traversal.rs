use crate::config::MAX_BLOCK_SIZE;

/// Indirect tiers below the direct pointers: single, double, triple.
pub const INDIRECT_LEVELS: usize = 3;

pub type BlockBuffer = [u8; MAX_BLOCK_SIZE];

/// One pointer-table buffer per indirect height.
///
/// The table of height `h` (1 = points at data blocks) lives in slot `h - 1`.
/// A descent only ever moves to a lower height, so each active recursion
/// level owns a distinct slot.
pub struct IndirectTables {
    tables: [BlockBuffer; INDIRECT_LEVELS],
}

impl IndirectTables {
    pub const fn new() -> Self {
        Self {
            tables: [[0u8; MAX_BLOCK_SIZE]; INDIRECT_LEVELS],
        }
    }

    pub(crate) fn table(&self, height: u32) -> &BlockBuffer {
        &self.tables[height as usize - 1]
    }

    pub(crate) fn table_mut(&mut self, height: u32) -> &mut BlockBuffer {
        &mut self.tables[height as usize - 1]
    }
}

impl Default for IndirectTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch memory for one traversal of an inode's block tree.
///
/// Holds the indirect tables plus the leaf buffer data blocks are read into.
/// It is borrowed mutably for the whole traversal, so a consumer cannot start
/// a second traversal on the same context; callers that need to nest use a
/// second context.
pub struct TraversalContext {
    tables: IndirectTables,
    leaf: BlockBuffer,
}

impl TraversalContext {
    pub const fn new() -> Self {
        Self {
            tables: IndirectTables::new(),
            leaf: [0u8; MAX_BLOCK_SIZE],
        }
    }

    pub(crate) fn split(&mut self) -> (&mut IndirectTables, &mut BlockBuffer) {
        (&mut self.tables, &mut self.leaf)
    }
}

impl Default for TraversalContext {
    fn default() -> Self {
        Self::new()
    }
}
