#![forbid(unsafe_code)]
//! On-disk format parsing for UFS2 structures.
//!
//! Pure parsing crate — no I/O, no side effects. Parses byte slices into
//! typed Rust structures representing the UFS2 superblock, inode records,
//! and directory entries. All multi-byte integers are little-endian, as
//! written by FreeBSD on little-endian hosts.

use serde::{Deserialize, Serialize};
use ufsview_types::{
    DIRECT_HEADER_LEN, ParseError, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG,
    S_IFSOCK, UFS2_ADDR_SIZE, UFS2_DINODE_SIZE, UFS2_MAGIC, UFS2_SUPERBLOCK_OFFSET,
    UFS2_SUPERBLOCK_SIZE, UFS_NDADDR, UFS_NIADDR, ensure_slice, read_fixed, read_le_i64,
    read_le_u16, read_le_u32, read_le_u64, trim_nul_padded,
};

// ── Superblock field offsets within the record (`struct fs`) ────────────────

const FS_IBLKNO: usize = 16;
const FS_NCG: usize = 44;
const FS_BSIZE: usize = 48;
const FS_FSIZE: usize = 52;
const FS_FRAG: usize = 56;
const FS_IPG: usize = 184;
const FS_FPG: usize = 188;
const FS_VOLNAME: usize = 680;
const FS_SIZE: usize = 1064;
const FS_DSIZE: usize = 1072;
const FS_MAGIC: usize = 1372;

const VOLNAME_LEN: usize = 32;

/// Parsed UFS2 superblock geometry.
///
/// Only the fields the traversal engine consumes are decoded; the rest of
/// the 1376-byte record is ignored. Every offset computation in the crate
/// derives from these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    /// Offset of the inode table within a cylinder group, in fragments.
    pub iblkno: u32,
    /// Number of cylinder groups.
    pub ncg: u32,
    /// Block size in bytes.
    pub bsize: u32,
    /// Fragment size in bytes.
    pub fsize: u32,
    /// Fragments per block (`bsize / fsize`).
    pub frag: u32,
    /// Inodes per cylinder group.
    pub ipg: u32,
    /// Fragments per cylinder group.
    pub fpg: u32,
    /// Total fragments in the filesystem.
    pub size: u64,
    /// Data fragments in the filesystem.
    pub dsize: u64,
    /// Volume label.
    pub volname: String,
    /// Superblock magic (always `UFS2_MAGIC` after a successful parse).
    pub magic: u32,
}

impl Superblock {
    /// Parse a superblock from its 1376-byte on-disk record.
    pub fn parse_superblock_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < UFS2_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: UFS2_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u32(region, FS_MAGIC)?;
        if magic != UFS2_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: u64::from(UFS2_MAGIC),
                actual: u64::from(magic),
            });
        }

        let size = read_le_i64(region, FS_SIZE)?;
        let dsize = read_le_i64(region, FS_DSIZE)?;
        if size < 0 || dsize < 0 {
            return Err(ParseError::InvalidField {
                field: "fs_size",
                reason: "negative fragment count",
            });
        }

        let sb = Self {
            iblkno: read_le_u32(region, FS_IBLKNO)?,
            ncg: read_le_u32(region, FS_NCG)?,
            bsize: read_le_u32(region, FS_BSIZE)?,
            fsize: read_le_u32(region, FS_FSIZE)?,
            frag: read_le_u32(region, FS_FRAG)?,
            ipg: read_le_u32(region, FS_IPG)?,
            fpg: read_le_u32(region, FS_FPG)?,
            size: size.unsigned_abs(),
            dsize: dsize.unsigned_abs(),
            volname: trim_nul_padded(&read_fixed::<VOLNAME_LEN>(region, FS_VOLNAME)?),
            magic,
        };
        sb.validate_geometry()?;
        Ok(sb)
    }

    /// Parse a superblock from a full volume image (fixed offset 65536).
    pub fn parse_from_image(image: &[u8]) -> Result<Self, ParseError> {
        let end = UFS2_SUPERBLOCK_OFFSET + UFS2_SUPERBLOCK_SIZE;
        if image.len() < end {
            return Err(ParseError::InsufficientData {
                needed: UFS2_SUPERBLOCK_SIZE,
                offset: UFS2_SUPERBLOCK_OFFSET,
                actual: image.len().saturating_sub(UFS2_SUPERBLOCK_OFFSET),
            });
        }
        Self::parse_superblock_region(&image[UFS2_SUPERBLOCK_OFFSET..end])
    }

    /// Validate geometry invariants.
    ///
    /// `bsize` must be a power-of-two multiple of `fsize`; group parameters
    /// must be non-zero. Violations make the volume unreadable.
    pub fn validate_geometry(&self) -> Result<(), ParseError> {
        if self.fsize == 0 || !self.fsize.is_power_of_two() {
            return Err(ParseError::InvalidField {
                field: "fs_fsize",
                reason: "must be a non-zero power of two",
            });
        }
        if !self.bsize.is_power_of_two() || !(4096..=65536).contains(&self.bsize) {
            return Err(ParseError::InvalidField {
                field: "fs_bsize",
                reason: "must be a power of two in 4096..=65536",
            });
        }
        if self.frag == 0 || self.bsize != self.fsize.saturating_mul(self.frag) {
            return Err(ParseError::InvalidField {
                field: "fs_frag",
                reason: "fs_bsize must equal fs_fsize * fs_frag",
            });
        }
        if self.ipg == 0 {
            return Err(ParseError::InvalidField {
                field: "fs_ipg",
                reason: "cannot be zero",
            });
        }
        if self.fpg == 0 {
            return Err(ParseError::InvalidField {
                field: "fs_fpg",
                reason: "cannot be zero",
            });
        }
        if self.ncg == 0 {
            return Err(ParseError::InvalidField {
                field: "fs_ncg",
                reason: "cannot be zero",
            });
        }
        Ok(())
    }

    /// Number of block-pointer entries in one indirect block.
    ///
    /// Derived from the block size and the 8-byte on-disk address width,
    /// never hardcoded.
    #[must_use]
    pub fn pointers_per_block(&self) -> u64 {
        u64::from(self.bsize) / UFS2_ADDR_SIZE as u64
    }
}

// ── Inode record ────────────────────────────────────────────────────────────

const DI_MODE: usize = 0;
const DI_NLINK: usize = 2;
const DI_UID: usize = 4;
const DI_GID: usize = 8;
const DI_SIZE: usize = 16;
const DI_BLOCKS: usize = 24;
const DI_MTIME: usize = 40;
const DI_DB: usize = 112;
const DI_IB: usize = 208;

/// Parsed UFS2 inode record (`ufs2_dinode`, 256 bytes on disk).
///
/// Block pointers are stored as signed 64-bit fragment numbers; zero means
/// an unallocated (sparse) region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ufs2Inode {
    pub mode: u16,
    pub nlink: u16,
    pub uid: u32,
    pub gid: u32,
    /// File length in bytes.
    pub size: u64,
    /// Blocks actually held (in 512-byte units, not consulted by traversal).
    pub blocks: u64,
    pub mtime: i64,
    /// Direct block pointers.
    pub db: [i64; UFS_NDADDR],
    /// Indirect block pointers: single, double, triple.
    pub ib: [i64; UFS_NIADDR],
}

impl Ufs2Inode {
    /// Parse an inode from its 256-byte on-disk record.
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < UFS2_DINODE_SIZE {
            return Err(ParseError::InsufficientData {
                needed: UFS2_DINODE_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let mut db = [0_i64; UFS_NDADDR];
        for (i, slot) in db.iter_mut().enumerate() {
            *slot = read_le_i64(bytes, DI_DB + i * UFS2_ADDR_SIZE)?;
        }
        let mut ib = [0_i64; UFS_NIADDR];
        for (i, slot) in ib.iter_mut().enumerate() {
            *slot = read_le_i64(bytes, DI_IB + i * UFS2_ADDR_SIZE)?;
        }

        Ok(Self {
            mode: read_le_u16(bytes, DI_MODE)?,
            nlink: read_le_u16(bytes, DI_NLINK)?,
            uid: read_le_u32(bytes, DI_UID)?,
            gid: read_le_u32(bytes, DI_GID)?,
            size: read_le_u64(bytes, DI_SIZE)?,
            blocks: read_le_u64(bytes, DI_BLOCKS)?,
            mtime: read_le_i64(bytes, DI_MTIME)?,
            db,
            ib,
        })
    }

    /// Extract the file type bits from the mode field.
    #[must_use]
    pub fn file_type_mode(&self) -> u16 {
        self.mode & S_IFMT
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type_mode() == S_IFDIR
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.file_type_mode() == S_IFREG
    }

    /// File type derived from the mode field.
    #[must_use]
    pub fn file_type(&self) -> FileType {
        match self.file_type_mode() {
            S_IFREG => FileType::RegFile,
            S_IFDIR => FileType::Dir,
            S_IFLNK => FileType::Symlink,
            S_IFCHR => FileType::CharDevice,
            S_IFBLK => FileType::BlockDevice,
            S_IFIFO => FileType::Fifo,
            S_IFSOCK => FileType::Socket,
            _ => FileType::Unknown,
        }
    }
}

// ── Directory entries ───────────────────────────────────────────────────────

/// Directory entry type tag (`d_type` in `struct direct`).
///
/// Values follow the BSD `DT_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Unknown = 0,
    Fifo = 1,
    CharDevice = 2,
    Dir = 4,
    BlockDevice = 6,
    RegFile = 8,
    Symlink = 10,
    Socket = 12,
    Whiteout = 14,
}

impl FileType {
    #[must_use]
    pub fn from_raw(val: u8) -> Self {
        match val {
            1 => Self::Fifo,
            2 => Self::CharDevice,
            4 => Self::Dir,
            6 => Self::BlockDevice,
            8 => Self::RegFile,
            10 => Self::Symlink,
            12 => Self::Socket,
            14 => Self::Whiteout,
            _ => Self::Unknown,
        }
    }
}

/// A borrowed directory entry (zero-copy reference into the block buffer).
///
/// `reclen` is the on-disk record length, used only to step to the next
/// entry — records are padded, so it is never derived from the name length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntryRef<'a> {
    pub ino: u32,
    pub reclen: u16,
    pub file_type: FileType,
    pub name: &'a [u8],
}

impl DirEntryRef<'_> {
    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }

    /// Whether the name starts with the hidden-entry marker (`.`), which
    /// also covers the `.` and `..` entries themselves.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.name.first() == Some(&b'.')
    }
}

/// A lazy, single-pass iterator over directory entries in a byte range.
///
/// Yields `Result<DirEntryRef<'a>, ParseError>` for each live entry
/// (inode != 0); free entries are skipped without reading a name. Iteration
/// ends when the consumed bytes reach the range length or a record length of
/// zero is seen (end-of-block, not an error). A record length or name that
/// would cross the end of the range is a parse error — the iterator never
/// reads past the supplied slice.
pub struct DirEntryIter<'a> {
    range: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> DirEntryIter<'a> {
    #[must_use]
    pub fn new(range: &'a [u8]) -> Self {
        Self {
            range,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next unread record within the range.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for DirEntryIter<'a> {
    type Item = Result<DirEntryRef<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.offset + DIRECT_HEADER_LEN > self.range.len() {
                return None;
            }

            let header = match ensure_slice(self.range, self.offset, DIRECT_HEADER_LEN) {
                Ok(h) => h,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let ino = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let reclen = u16::from_le_bytes([header[4], header[5]]);
            let file_type_raw = header[6];
            let namlen = usize::from(header[7]);

            if reclen == 0 {
                // End-of-block padding, not an error.
                self.done = true;
                return None;
            }

            let entry_end = self.offset + usize::from(reclen);
            if entry_end > self.range.len() {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "d_reclen",
                    reason: "directory record extends past its range",
                }));
            }

            if ino == 0 {
                // Free slot; name bytes are meaningless.
                self.offset = entry_end;
                continue;
            }

            let name_end = self.offset + DIRECT_HEADER_LEN + namlen;
            if name_end > entry_end {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "d_namlen",
                    reason: "name extends past d_reclen",
                }));
            }
            let name = &self.range[self.offset + DIRECT_HEADER_LEN..name_end];

            self.offset = entry_end;
            return Some(Ok(DirEntryRef {
                ino,
                reclen,
                file_type: FileType::from_raw(file_type_raw),
                name,
            }));
        }
    }
}
