use alloc::vec::Vec;

use log::warn;

use super::{read_u16_le, read_u32_le};

/// Fixed header size of a directory record (inode, rec_len, name_len, type).
pub const DIR_RECORD_HEADER_SIZE: usize = 8;

/// ext2 directory entry file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown = 0,
    RegularFile = 1,
    Directory = 2,
    CharDevice = 3,
    BlockDevice = 4,
    Fifo = 5,
    Socket = 6,
    Symlink = 7,
}

impl FileType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => FileType::RegularFile,
            2 => FileType::Directory,
            3 => FileType::CharDevice,
            4 => FileType::BlockDevice,
            5 => FileType::Fifo,
            6 => FileType::Socket,
            7 => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }
}

/// Which of the two directory record layouts a volume uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryFormat {
    /// 2-byte name length, no type byte.
    Legacy,
    /// 1-byte name length followed by a file type byte (`INCOMPAT_FILETYPE`).
    WithFileType,
}

/// One directory record, borrowing its name from the block it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirRecord<'a> {
    pub inode: u32,
    pub rec_len: u16,
    pub file_type: FileType,
    pub name: &'a [u8],
}

impl<'a> DirRecord<'a> {
    /// Parse the record at the start of `raw`.
    ///
    /// Returns `None` when the header or the name would run past `raw`.
    pub fn parse(raw: &'a [u8], format: DirEntryFormat) -> Option<Self> {
        if raw.len() < DIR_RECORD_HEADER_SIZE {
            return None;
        }

        let inode = read_u32_le(raw, 0);
        let rec_len = read_u16_le(raw, 4);
        let (name_len, file_type) = match format {
            DirEntryFormat::Legacy => (read_u16_le(raw, 6) as usize, FileType::Unknown),
            DirEntryFormat::WithFileType => (raw[6] as usize, FileType::from_u8(raw[7])),
        };

        let name = raw.get(DIR_RECORD_HEADER_SIZE..DIR_RECORD_HEADER_SIZE + name_len)?;
        Some(DirRecord {
            inode,
            rec_len,
            file_type,
            name,
        })
    }

    pub fn is_unused(&self) -> bool {
        self.inode == 0
    }
}

/// Cursor over the packed records of one directory block.
///
/// Advances by each record's `rec_len`. A record whose length cannot move
/// the cursor forward, or whose header does not fit, ends the block.
pub struct DirRecords<'a> {
    block: &'a [u8],
    offset: usize,
    format: DirEntryFormat,
}

impl<'a> DirRecords<'a> {
    pub fn new(block: &'a [u8], format: DirEntryFormat) -> Self {
        Self {
            block,
            offset: 0,
            format,
        }
    }
}

impl<'a> Iterator for DirRecords<'a> {
    type Item = DirRecord<'a>;

    fn next(&mut self) -> Option<DirRecord<'a>> {
        if self.offset + DIR_RECORD_HEADER_SIZE > self.block.len() {
            return None;
        }

        let Some(record) = DirRecord::parse(&self.block[self.offset..], self.format) else {
            warn!("dir record at {} runs past the block", self.offset);
            self.offset = self.block.len();
            return None;
        };
        if (record.rec_len as usize) < DIR_RECORD_HEADER_SIZE {
            warn!("dir record at {} has rec_len {}", self.offset, record.rec_len);
            self.offset = self.block.len();
            return None;
        }

        self.offset += record.rec_len as usize;
        Some(record)
    }
}

/// Owned directory entry as returned by directory listings.
///
/// Names are raw bytes; ext2 does not require them to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub file_type: FileType,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn from_record(record: &DirRecord<'_>) -> Self {
        DirEntry {
            inode: record.inode,
            file_type: record.file_type,
            name: record.name.to_vec(),
        }
    }

    /// The name as text, if it is valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.name).ok()
    }

    pub fn is_dot_or_dotdot(&self) -> bool {
        self.name == b"." || self.name == b".."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_record(block: &mut Vec<u8>, inode: u32, rec_len: u16, name: &str, format: DirEntryFormat) {
        let start = block.len();
        block.extend_from_slice(&inode.to_le_bytes());
        block.extend_from_slice(&rec_len.to_le_bytes());
        match format {
            DirEntryFormat::Legacy => block.extend_from_slice(&(name.len() as u16).to_le_bytes()),
            DirEntryFormat::WithFileType => block.extend_from_slice(&[name.len() as u8, 1]),
        }
        block.extend_from_slice(name.as_bytes());
        block.resize(start + rec_len as usize, 0);
    }

    #[test]
    fn test_records_follow_rec_len() {
        let format = DirEntryFormat::WithFileType;
        let mut block = Vec::new();
        push_record(&mut block, 2, 12, ".", format);
        push_record(&mut block, 2, 12, "..", format);
        push_record(&mut block, 0, 16, "gone", format);
        push_record(&mut block, 12, 1024 - 40, "kernel.bin", format);

        let records: Vec<_> = DirRecords::new(&block, format).collect();
        assert_eq!(records.len(), 4);
        assert!(records[2].is_unused());
        assert_eq!(records[3].inode, 12);
        assert_eq!(records[3].name, b"kernel.bin");
        assert_eq!(records[3].file_type, FileType::RegularFile);
    }

    #[test]
    fn test_legacy_layout_reads_two_byte_name_len() {
        let format = DirEntryFormat::Legacy;
        let mut block = Vec::new();
        push_record(&mut block, 11, 64, "lost+found", format);

        let record = DirRecord::parse(&block, format).unwrap();
        assert_eq!(record.name, b"lost+found");
        assert_eq!(record.file_type, FileType::Unknown);
    }

    #[test]
    fn test_zero_rec_len_ends_block() {
        let format = DirEntryFormat::WithFileType;
        let mut block = Vec::new();
        push_record(&mut block, 2, 12, ".", format);
        block.extend_from_slice(&[5, 0, 0, 0, 0, 0, 1, 1, b'x']);
        block.resize(64, 0);

        let records: Vec<_> = DirRecords::new(&block, format).collect();
        assert_eq!(records.len(), 1);
    }
}
