#![forbid(unsafe_code)]
//! UFS2 traversal engine.
//!
//! A [`Volume`] is an immutable read-only view over a partition image: the
//! borrowed byte buffer plus its parsed superblock. All traversal — inode
//! lookup, block-run enumeration, path resolution, content extraction, and
//! recursive listing — happens through bounds-checked slices of that buffer.
//! Nothing is cached and nothing is mutated; concurrent traversals of the
//! same volume are safe by construction.

use std::io::Write;

use tracing::{debug, trace};
use ufsview_types::{
    ParseError, UFS2_ADDR_SIZE, UFS2_DINODE_SIZE, UFS2_SUPERBLOCK_OFFSET, read_le_i64,
    u64_to_usize,
};

pub use ufsview_error::{Result, UfsError};
pub use ufsview_ondisk::{DirEntryIter, DirEntryRef, FileType, Superblock, Ufs2Inode};
pub use ufsview_types::{ByteOffset, FragNumber, InodeNumber};

pub mod geom;

/// Highest indirection level traversed (double). Bytes remaining past this
/// budget would require triple-indirect blocks, which are out of scope.
const MAX_INDIRECTION: u32 = 2;

/// Convert a parse-layer error into a runtime error, attaching the byte
/// offset the read was attempted at.
fn parse_to_ufs_error(err: &ParseError, offset: u64) -> UfsError {
    match err {
        ParseError::InvalidMagic { .. } => UfsError::Format(err.to_string()),
        ParseError::InvalidField { .. }
        | ParseError::InsufficientData { .. }
        | ParseError::IntegerConversion { .. } => UfsError::Corruption {
            offset,
            detail: err.to_string(),
        },
    }
}

/// Where one contiguous piece of file content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSource {
    /// Readable bytes at this offset within the volume.
    Disk(ByteOffset),
    /// Sparse hole: the region is logically zero-filled and has no backing
    /// block on disk.
    Hole,
}

/// One contiguous region contributing to a file's content.
///
/// Runs are produced in file-offset order with no gaps or overlaps; their
/// lengths sum to exactly the inode's size, and no single run exceeds the
/// block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRun {
    pub source: RunSource,
    pub len: u64,
}

/// Read-only view over a UFS2 partition image.
pub struct Volume<'a> {
    image: &'a [u8],
    sb: Superblock,
}

impl std::fmt::Debug for Volume<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("image_len", &self.image.len())
            .field("bsize", &self.sb.bsize)
            .field("fsize", &self.sb.fsize)
            .field("ncg", &self.sb.ncg)
            .finish()
    }
}

impl<'a> Volume<'a> {
    /// Parse the superblock and validate geometry.
    ///
    /// The caller keeps ownership of the image bytes; the volume only
    /// borrows them. A zero-length image fails before any traversal.
    pub fn open(image: &'a [u8]) -> Result<Self> {
        if image.is_empty() {
            return Err(UfsError::EmptyImage);
        }
        let sb = Superblock::parse_from_image(image).map_err(|err| match err {
            ParseError::InvalidMagic { .. } => UfsError::Format(err.to_string()),
            ParseError::InvalidField { .. } => UfsError::InvalidGeometry(err.to_string()),
            other => parse_to_ufs_error(&other, UFS2_SUPERBLOCK_OFFSET as u64),
        })?;
        debug!(
            bsize = sb.bsize,
            fsize = sb.fsize,
            ncg = sb.ncg,
            image_len = image.len(),
            "volume opened"
        );
        Ok(Self { image, sb })
    }

    #[must_use]
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.image.len() as u64
    }

    /// Bounds-checked view of `len` bytes at `offset`.
    ///
    /// An out-of-range request is a corruption signal: the geometry produced
    /// an address outside the image.
    fn slice(&self, offset: ByteOffset, len: u64, what: &'static str) -> Result<&'a [u8]> {
        let corrupt = |detail: String| UfsError::Corruption {
            offset: offset.0,
            detail,
        };
        let start = offset
            .to_usize()
            .map_err(|_| corrupt(format!("{what}: offset exceeds address space")))?;
        let len = u64_to_usize(len, "slice_len")
            .map_err(|_| corrupt(format!("{what}: length exceeds address space")))?;
        let end = start
            .checked_add(len)
            .ok_or_else(|| corrupt(format!("{what}: range overflow")))?;
        if end > self.image.len() {
            return Err(corrupt(format!(
                "{what}: range {start}..{end} past end of image ({} bytes)",
                self.image.len()
            )));
        }
        Ok(&self.image[start..end])
    }

    // ── Inode resolution ────────────────────────────────────────────────

    /// Read and decode the inode record for `ino`.
    ///
    /// The record is read fresh from the image on every call. No
    /// allocated-bit validation is performed: resolving a never-allocated
    /// inode number decodes whatever bytes occupy that slot.
    pub fn read_inode(&self, ino: InodeNumber) -> Result<Ufs2Inode> {
        let offset = geom::inode_offset(&self.sb, ino).ok_or_else(|| UfsError::Corruption {
            offset: 0,
            detail: format!("inode {ino}: offset computation overflowed"),
        })?;
        let bytes = self.slice(offset, UFS2_DINODE_SIZE as u64, "inode record")?;
        let inode =
            Ufs2Inode::parse_from_bytes(bytes).map_err(|e| parse_to_ufs_error(&e, offset.0))?;
        trace!(%ino, size = inode.size, mode = inode.mode, "inode read");
        Ok(inode)
    }

    // ── Block enumeration ───────────────────────────────────────────────

    /// Enumerate the ordered block runs covering exactly `inode.size` bytes.
    ///
    /// Walks the 12 direct pointers, then the single- and double-indirect
    /// trees through one recursive resolver parameterized by depth. A zero
    /// pointer mid-stream is a sparse hole; a zero indirect *root* pointer
    /// while bytes remain is corruption. Bytes remaining past double
    /// indirection are unsupported.
    pub fn enumerate_runs(&self, inode: &Ufs2Inode) -> Result<Vec<BlockRun>> {
        let mut runs = Vec::new();
        let mut remaining = inode.size;

        for &addr in &inode.db {
            if remaining == 0 {
                break;
            }
            self.push_subtree(addr, 0, &mut remaining, &mut runs)?;
        }

        for depth in 1..=MAX_INDIRECTION {
            if remaining == 0 {
                break;
            }
            let root = inode.ib[(depth - 1) as usize];
            if root == 0 {
                return Err(UfsError::Corruption {
                    offset: 0,
                    detail: format!(
                        "indirect pointer at depth {depth} is zero with {remaining} bytes remaining"
                    ),
                });
            }
            self.push_subtree(root, depth, &mut remaining, &mut runs)?;
        }

        if remaining > 0 {
            return Err(UfsError::UnsupportedFeature(format!(
                "file needs triple indirection ({remaining} bytes past double-indirect capacity)"
            )));
        }
        trace!(size = inode.size, runs = runs.len(), "blocks enumerated");
        Ok(runs)
    }

    /// Emit the runs for one block-pointer subtree.
    ///
    /// `depth` 0 is a data block, 1 a single-indirect block, 2 a
    /// double-indirect block. The remaining-size budget is carried across
    /// the whole traversal so tail runs are sized correctly.
    fn push_subtree(
        &self,
        addr: i64,
        depth: u32,
        remaining: &mut u64,
        runs: &mut Vec<BlockRun>,
    ) -> Result<()> {
        if *remaining == 0 {
            return Ok(());
        }
        if addr < 0 {
            return Err(UfsError::Corruption {
                offset: 0,
                detail: format!("negative block pointer {addr} at depth {depth}"),
            });
        }
        let bsize = u64::from(self.sb.bsize);

        if addr == 0 {
            if depth == 0 {
                let len = bsize.min(*remaining);
                runs.push(BlockRun {
                    source: RunSource::Hole,
                    len,
                });
                *remaining -= len;
            } else {
                // An absent indirect block zero-fills everything beneath it.
                for _ in 0..self.sb.pointers_per_block() {
                    if *remaining == 0 {
                        break;
                    }
                    self.push_subtree(0, depth - 1, remaining, runs)?;
                }
            }
            return Ok(());
        }

        let offset = geom::data_offset(&self.sb, FragNumber(addr.unsigned_abs())).ok_or_else(
            || UfsError::Corruption {
                offset: 0,
                detail: format!("block {addr}: offset computation overflowed"),
            },
        )?;

        if depth == 0 {
            let len = bsize.min(*remaining);
            // Validate the range now so extraction cannot run off the image.
            self.slice(offset, len, "data block")?;
            runs.push(BlockRun {
                source: RunSource::Disk(offset),
                len,
            });
            *remaining -= len;
        } else {
            let block = self.slice(offset, bsize, "indirect block")?;
            let entries = u64_to_usize(self.sb.pointers_per_block(), "pointers_per_block")
                .map_err(|e| parse_to_ufs_error(&e, offset.0))?;
            for i in 0..entries {
                if *remaining == 0 {
                    break;
                }
                let child = read_le_i64(block, i * UFS2_ADDR_SIZE)
                    .map_err(|e| parse_to_ufs_error(&e, offset.0))?;
                self.push_subtree(child, depth - 1, remaining, runs)?;
            }
        }
        Ok(())
    }

    // ── Path resolution ─────────────────────────────────────────────────

    /// Resolve a slash-separated path from the root directory.
    ///
    /// The path is decomposed into components up front; empty components
    /// (leading, trailing, or doubled slashes) are ignored, so an empty
    /// path resolves to the root itself. The terminal component resolves to
    /// whatever live entry carries that name — file or directory; callers
    /// that require a regular file enforce that on the returned inode.
    ///
    /// Hidden-name filtering is not applied here: dotfiles resolve normally.
    pub fn resolve_path(&self, path: &str) -> Result<(InodeNumber, Ufs2Inode)> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();

        let mut ino = InodeNumber::ROOT;
        let mut inode = self.read_inode(ino)?;

        for (idx, component) in components.iter().enumerate() {
            if !inode.is_dir() {
                return Err(UfsError::NotDirectory);
            }
            let terminal = idx + 1 == components.len();
            let child = self
                .lookup_component(&inode, component.as_bytes(), terminal)?
                .ok_or_else(|| UfsError::NotFound((*component).to_owned()))?;
            ino = InodeNumber(u64::from(child));
            inode = self.read_inode(ino)?;
            trace!(component = *component, %ino, terminal, "path component resolved");
        }

        debug!(path, %ino, "path resolved");
        Ok((ino, inode))
    }

    /// Scan a directory's blocks for an entry named `name`.
    ///
    /// Non-terminal components must be directories to descend; a same-named
    /// entry of the wrong type does not abort the scan, since a later
    /// sibling could still match. A hole run means the directory has no
    /// further entries.
    fn lookup_component(
        &self,
        dir: &Ufs2Inode,
        name: &[u8],
        terminal: bool,
    ) -> Result<Option<u32>> {
        for run in self.enumerate_runs(dir)? {
            let offset = match run.source {
                RunSource::Hole => break,
                RunSource::Disk(offset) => offset,
            };
            let bytes = self.slice(offset, run.len, "directory block")?;
            for entry in DirEntryIter::new(bytes) {
                let entry = entry.map_err(|e| parse_to_ufs_error(&e, offset.0))?;
                if entry.name != name {
                    continue;
                }
                if terminal || entry.file_type == FileType::Dir {
                    return Ok(Some(entry.ino));
                }
            }
        }
        Ok(None)
    }

    // ── Content extraction ──────────────────────────────────────────────

    /// Stream exactly `inode.size` bytes of file content to `out`.
    ///
    /// Runs are copied in order, one at a time; sparse runs are written as
    /// zeros. Requires a regular file.
    pub fn extract_to<W: Write>(&self, inode: &Ufs2Inode, out: &mut W) -> Result<u64> {
        if inode.is_dir() {
            return Err(UfsError::IsDirectory);
        }
        if !inode.is_regular() {
            return Err(UfsError::NotRegular);
        }

        let mut written = 0_u64;
        for run in self.enumerate_runs(inode)? {
            match run.source {
                RunSource::Disk(offset) => {
                    out.write_all(self.slice(offset, run.len, "data block")?)?;
                }
                RunSource::Hole => {
                    let zeros = vec![0_u8; u64_to_usize(run.len, "hole_len").map_err(|_| {
                        UfsError::Corruption {
                            offset: 0,
                            detail: "hole length exceeds address space".to_owned(),
                        }
                    })?];
                    out.write_all(&zeros)?;
                }
            }
            written += run.len;
        }
        debug!(written, size = inode.size, "content extracted");
        Ok(written)
    }

    // ── Recursive listing ───────────────────────────────────────────────

    /// Recursively list the whole tree from the root directory.
    ///
    /// Entries print in on-disk order at `4 * depth` spaces of indentation;
    /// directory names get a trailing `:` and are descended into. Names
    /// starting with `.` are omitted (which also covers `.` and `..`; no
    /// further cycle detection is performed).
    pub fn walk_tree<W: Write>(&self, out: &mut W) -> Result<()> {
        let root = self.read_inode(InodeNumber::ROOT)?;
        self.walk_dir(&root, 0, out)
    }

    /// List one directory at the given depth, descending into
    /// subdirectories.
    pub fn walk_dir<W: Write>(&self, dir: &Ufs2Inode, depth: usize, out: &mut W) -> Result<()> {
        if !dir.is_dir() {
            return Err(UfsError::NotDirectory);
        }
        let indent = depth * 4;
        for run in self.enumerate_runs(dir)? {
            let offset = match run.source {
                RunSource::Hole => break,
                RunSource::Disk(offset) => offset,
            };
            let bytes = self.slice(offset, run.len, "directory block")?;
            for entry in DirEntryIter::new(bytes) {
                let entry = entry.map_err(|e| parse_to_ufs_error(&e, offset.0))?;
                if entry.is_hidden() {
                    continue;
                }
                if entry.file_type == FileType::Dir {
                    writeln!(out, "{:indent$}{}:", "", entry.name_str())?;
                    let child = self.read_inode(InodeNumber(u64::from(entry.ino)))?;
                    self.walk_dir(&child, depth + 1, out)?;
                } else {
                    writeln!(out, "{:indent$}{}", "", entry.name_str())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ufsview_types::{S_IFDIR, S_IFLNK, S_IFREG, UFS2_MAGIC};

    const BSIZE: u64 = 4096;
    const FSIZE: u64 = 512;
    const SB_OFF: usize = 65536;
    const INODE_TABLE: usize = 131_072; // fragment 256 * 512
    const FIRST_DATA_FRAG: u64 = 768; // past the 1024-entry inode table

    fn put_u32(image: &mut [u8], offset: usize, value: u32) {
        image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u16(image: &mut [u8], offset: usize, value: u16) {
        image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_i64(image: &mut [u8], offset: usize, value: i64) {
        image[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u64(image: &mut [u8], offset: usize, value: u64) {
        image[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Builds a synthetic single-group UFS2 image: superblock at 65536,
    /// inode table at fragment 256, data blocks allocated from fragment 768.
    struct ImageBuilder {
        image: Vec<u8>,
        next_frag: u64,
        next_ino: u64,
    }

    impl ImageBuilder {
        fn new() -> Self {
            let mut image = vec![0_u8; (FIRST_DATA_FRAG * FSIZE) as usize];
            put_u32(&mut image, SB_OFF + 16, 256); // fs_iblkno
            put_u32(&mut image, SB_OFF + 44, 1); // fs_ncg
            put_u32(&mut image, SB_OFF + 48, 4096); // fs_bsize
            put_u32(&mut image, SB_OFF + 52, 512); // fs_fsize
            put_u32(&mut image, SB_OFF + 56, 8); // fs_frag
            put_u32(&mut image, SB_OFF + 184, 1024); // fs_ipg
            put_u32(&mut image, SB_OFF + 188, 262_144); // fs_fpg
            image[SB_OFF + 680..SB_OFF + 687].copy_from_slice(b"imgtest");
            put_i64(&mut image, SB_OFF + 1064, 262_144); // fs_size
            put_i64(&mut image, SB_OFF + 1072, 260_000); // fs_dsize
            put_u32(&mut image, SB_OFF + 1372, UFS2_MAGIC);
            Self {
                image,
                next_frag: FIRST_DATA_FRAG,
                next_ino: 3,
            }
        }

        fn ensure_len(&mut self, len: usize) {
            if self.image.len() < len {
                self.image.resize(len, 0);
            }
        }

        fn alloc_block(&mut self) -> u64 {
            let frag = self.next_frag;
            self.next_frag += BSIZE / FSIZE;
            self.ensure_len((self.next_frag * FSIZE) as usize);
            frag
        }

        fn write_block(&mut self, frag: u64, data: &[u8]) {
            assert!(data.len() <= BSIZE as usize);
            let start = (frag * FSIZE) as usize;
            self.image[start..start + data.len()].copy_from_slice(data);
        }

        fn alloc_data_block(&mut self, data: &[u8]) -> u64 {
            let frag = self.alloc_block();
            self.write_block(frag, data);
            frag
        }

        fn alloc_inode(&mut self) -> u64 {
            let ino = self.next_ino;
            self.next_ino += 1;
            ino
        }

        fn inode_offset(ino: u64) -> usize {
            INODE_TABLE + (ino as usize) * 256
        }

        fn write_inode(&mut self, ino: u64, mode: u16, size: u64, db: &[u64; 12], ib: &[u64; 3]) {
            let base = Self::inode_offset(ino);
            self.image[base..base + 256].fill(0);
            put_u16(&mut self.image, base, mode);
            put_u16(&mut self.image, base + 2, 1); // nlink
            put_u64(&mut self.image, base + 16, size);
            for (i, &frag) in db.iter().enumerate() {
                put_i64(&mut self.image, base + 112 + i * 8, frag as i64);
            }
            for (i, &frag) in ib.iter().enumerate() {
                put_i64(&mut self.image, base + 208 + i * 8, frag as i64);
            }
        }

        /// Write a pointer block holding `frags` (zero-padded to a full block).
        fn write_pointer_block(&mut self, frags: &[u64]) -> u64 {
            assert!(frags.len() <= (BSIZE / 8) as usize);
            let mut block = vec![0_u8; BSIZE as usize];
            for (i, &frag) in frags.iter().enumerate() {
                block[i * 8..i * 8 + 8].copy_from_slice(&(frag as i64).to_le_bytes());
            }
            self.alloc_data_block(&block)
        }

        /// Lay out a regular file across direct, single-indirect, and
        /// double-indirect blocks as its length requires.
        fn add_file(&mut self, content: &[u8]) -> u64 {
            let frags: Vec<u64> = content
                .chunks(BSIZE as usize)
                .map(|chunk| self.alloc_data_block(chunk))
                .collect();

            let ppb = (BSIZE / 8) as usize;
            let mut db = [0_u64; 12];
            let mut ib = [0_u64; 3];

            let direct = frags.len().min(12);
            db[..direct].copy_from_slice(&frags[..direct]);

            let rest = &frags[direct..];
            if !rest.is_empty() {
                let single = &rest[..rest.len().min(ppb)];
                ib[0] = self.write_pointer_block(single);
            }
            if rest.len() > ppb {
                let doubles: Vec<u64> = rest[ppb..]
                    .chunks(ppb)
                    .map(|group| self.write_pointer_block(group))
                    .collect();
                ib[1] = self.write_pointer_block(&doubles);
            }

            let ino = self.alloc_inode();
            self.write_inode(ino, S_IFREG | 0o644, content.len() as u64, &db, &ib);
            ino
        }

        /// Write a one-block directory; the last entry's record length is
        /// stretched to the end of the block, as newfs lays directories out.
        fn add_dir(&mut self, ino: u64, parent: u64, entries: &[(&[u8], u64, FileType)]) {
            let mut block = vec![0_u8; BSIZE as usize];
            let mut offset = 0_usize;

            let mut all: Vec<(&[u8], u64, FileType)> =
                vec![(b".", ino, FileType::Dir), (b"..", parent, FileType::Dir)];
            all.extend_from_slice(entries);

            for (i, (name, entry_ino, ftype)) in all.iter().enumerate() {
                let reclen = if i + 1 == all.len() {
                    BSIZE as usize - offset
                } else {
                    (8 + name.len() + 3) & !3
                };
                put_u32(&mut block, offset, *entry_ino as u32);
                put_u16(&mut block, offset + 4, reclen as u16);
                block[offset + 6] = *ftype as u8;
                block[offset + 7] = name.len() as u8;
                block[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
                offset += reclen;
            }

            let frag = self.alloc_data_block(&block);
            let mut db = [0_u64; 12];
            db[0] = frag;
            self.write_inode(ino, S_IFDIR | 0o755, BSIZE, &db, &[0; 3]);
        }

        fn clear_direct(&mut self, ino: u64, idx: usize) {
            let base = Self::inode_offset(ino);
            put_i64(&mut self.image, base + 112 + idx * 8, 0);
        }

        fn clear_indirect(&mut self, ino: u64, level: usize) {
            let base = Self::inode_offset(ino);
            put_i64(&mut self.image, base + 208 + level * 8, 0);
        }

        fn set_direct(&mut self, ino: u64, idx: usize, frag: i64) {
            let base = Self::inode_offset(ino);
            put_i64(&mut self.image, base + 112 + idx * 8, frag);
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Root with a small file tree: /a/b/c (file), /f.txt, /.hidden.
    fn build_tree_image() -> (Vec<u8>, Vec<u8>) {
        let mut b = ImageBuilder::new();
        let c_content = patterned(10_000);
        let c = b.add_file(&c_content);
        let f = b.add_file(b"top-level\n");
        let hidden = b.add_file(b"secret\n");
        let dir_b = b.alloc_inode();
        let dir_a = b.alloc_inode();
        b.add_dir(dir_b, dir_a, &[(b"c", c, FileType::RegFile)]);
        b.add_dir(dir_a, 2, &[(b"b", dir_b, FileType::Dir)]);
        b.add_dir(
            2,
            2,
            &[
                (b"a", dir_a, FileType::Dir),
                (b"f.txt", f, FileType::RegFile),
                (b".hidden", hidden, FileType::RegFile),
            ],
        );
        (b.image, c_content)
    }

    fn run_total(runs: &[BlockRun]) -> u64 {
        runs.iter().map(|r| r.len).sum()
    }

    // ── Volume open ─────────────────────────────────────────────────────

    #[test]
    fn open_rejects_empty_image() {
        let err = Volume::open(&[]).unwrap_err();
        assert!(matches!(err, UfsError::EmptyImage));
    }

    #[test]
    fn open_rejects_garbage() {
        let garbage = vec![0xAB_u8; 128 * 1024];
        let err = Volume::open(&garbage).unwrap_err();
        assert!(matches!(err, UfsError::Format(_)), "got {err:?}");
    }

    #[test]
    fn open_rejects_bad_geometry() {
        let mut b = ImageBuilder::new();
        put_u32(&mut b.image, SB_OFF + 56, 4); // frag no longer bsize/fsize
        let err = Volume::open(&b.image).unwrap_err();
        assert!(matches!(err, UfsError::InvalidGeometry(_)), "got {err:?}");
    }

    #[test]
    fn open_parses_superblock() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        assert_eq!(vol.superblock().bsize, 4096);
        assert_eq!(vol.superblock().volname, "imgtest");
        assert_eq!(vol.len_bytes(), image.len() as u64);
    }

    // ── Inode resolution ────────────────────────────────────────────────

    #[test]
    fn root_inode_is_a_directory() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let root = vol.read_inode(InodeNumber::ROOT).unwrap();
        assert!(root.is_dir());
        assert_eq!(root.size, BSIZE);
    }

    #[test]
    fn inode_past_image_end_is_corruption() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        // Inode far past the backing image (group 3 of a 1-group volume).
        let err = vol.read_inode(InodeNumber(900_000)).unwrap_err();
        assert!(matches!(err, UfsError::Corruption { .. }), "got {err:?}");
    }

    // ── Block enumeration ───────────────────────────────────────────────

    #[test]
    fn runs_cover_direct_file_exactly() {
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(10_000));
        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();

        let runs = vol.enumerate_runs(&inode).unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(run_total(&runs), 10_000);
        assert_eq!(runs[0].len, 4096);
        assert_eq!(runs[1].len, 4096);
        assert_eq!(runs[2].len, 10_000 - 8192);
        assert!(runs.iter().all(|r| r.len <= BSIZE));
    }

    #[test]
    fn exact_multiple_size_ends_with_full_run() {
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(8192));
        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();

        let runs = vol.enumerate_runs(&inode).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs.last().unwrap().len, BSIZE);
        assert_eq!(run_total(&runs), 8192);
    }

    #[test]
    fn zero_size_file_has_no_runs() {
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&[]);
        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        assert!(vol.enumerate_runs(&inode).unwrap().is_empty());
    }

    #[test]
    fn runs_walk_single_indirection() {
        let size = 12 * 4096 + 5 * 4096 + 100; // 17 full-ish blocks
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(size));
        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();

        let runs = vol.enumerate_runs(&inode).unwrap();
        assert_eq!(runs.len(), 18);
        assert_eq!(run_total(&runs), size as u64);
        assert_eq!(runs.last().unwrap().len, 100);
        assert!(runs.iter().all(|r| r.len <= BSIZE));
    }

    #[test]
    fn runs_walk_double_indirection() {
        // Past the direct (12 blocks) and single-indirect (512 blocks) reach.
        let size = (12 + 512 + 3) * 4096 + 77;
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(size));
        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        assert_ne!(inode.ib[1], 0);

        let runs = vol.enumerate_runs(&inode).unwrap();
        assert_eq!(run_total(&runs), size as u64);
        assert_eq!(runs.last().unwrap().len, 77);
        assert!(runs.iter().all(|r| r.len <= BSIZE));
    }

    #[test]
    fn sparse_direct_pointer_becomes_hole_run() {
        let mut content = patterned(3 * 4096);
        content[4096..8192].fill(0);
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&content);
        b.clear_direct(ino, 1);

        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        let runs = vol.enumerate_runs(&inode).unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].source, RunSource::Hole);
        assert_eq!(runs[1].len, BSIZE);
        assert_eq!(run_total(&runs), 3 * 4096);
    }

    #[test]
    fn zero_indirect_root_with_bytes_remaining_is_corruption() {
        let size = 14 * 4096;
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(size));
        b.clear_indirect(ino, 0);

        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        let err = vol.enumerate_runs(&inode).unwrap_err();
        assert!(matches!(err, UfsError::Corruption { .. }), "got {err:?}");
    }

    #[test]
    fn pointer_past_image_end_is_corruption() {
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(4096));
        b.set_direct(ino, 0, 50_000_000);

        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        let err = vol.enumerate_runs(&inode).unwrap_err();
        assert!(matches!(err, UfsError::Corruption { .. }), "got {err:?}");
    }

    #[test]
    fn negative_pointer_is_corruption() {
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&patterned(4096));
        b.set_direct(ino, 0, -44);

        let vol = Volume::open(&b.image).unwrap();
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        let err = vol.enumerate_runs(&inode).unwrap_err();
        assert!(matches!(err, UfsError::Corruption { .. }), "got {err:?}");
    }

    // ── Content extraction ──────────────────────────────────────────────

    fn extract(vol: &Volume<'_>, ino: u64) -> Vec<u8> {
        let inode = vol.read_inode(InodeNumber(ino)).unwrap();
        let mut out = Vec::new();
        let written = vol.extract_to(&inode, &mut out).unwrap();
        assert_eq!(written, inode.size);
        out
    }

    #[test]
    fn round_trip_direct_blocks() {
        let content = patterned(10_000);
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&content);
        let vol = Volume::open(&b.image).unwrap();
        assert_eq!(extract(&vol, ino), content);
    }

    #[test]
    fn round_trip_across_indirect_boundaries() {
        let content = patterned((12 + 512 + 2) * 4096 + 1234);
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&content);
        let vol = Volume::open(&b.image).unwrap();
        assert_eq!(extract(&vol, ino), content);
    }

    #[test]
    fn round_trip_through_sparse_hole() {
        let mut content = patterned(5 * 4096 + 500);
        content[2 * 4096..3 * 4096].fill(0);
        let mut b = ImageBuilder::new();
        let ino = b.add_file(&content);
        b.clear_direct(ino, 2);
        let vol = Volume::open(&b.image).unwrap();
        assert_eq!(extract(&vol, ino), content);
    }

    #[test]
    fn extract_refuses_directories_and_specials() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let root = vol.read_inode(InodeNumber::ROOT).unwrap();
        let mut out = Vec::new();
        let err = vol.extract_to(&root, &mut out).unwrap_err();
        assert!(matches!(err, UfsError::IsDirectory));
        assert!(out.is_empty());

        let mut b = ImageBuilder::new();
        let ino = b.alloc_inode();
        b.write_inode(ino, S_IFLNK | 0o777, 0, &[0; 12], &[0; 3]);
        let vol = Volume::open(&b.image).unwrap();
        let link = vol.read_inode(InodeNumber(ino)).unwrap();
        let err = vol.extract_to(&link, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, UfsError::NotRegular));
    }

    // ── Path resolution ─────────────────────────────────────────────────

    #[test]
    fn resolve_empty_path_yields_root() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let (ino, inode) = vol.resolve_path("").unwrap();
        assert_eq!(ino, InodeNumber::ROOT);
        assert!(inode.is_dir());
    }

    #[test]
    fn resolve_nested_file() {
        let (image, content) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let (_, inode) = vol.resolve_path("a/b/c").unwrap();
        assert!(inode.is_regular());
        assert_eq!(inode.size, content.len() as u64);

        let mut out = Vec::new();
        vol.extract_to(&inode, &mut out).unwrap();
        assert_eq!(out, content);
    }

    #[test]
    fn resolve_intermediate_directory() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let (_, inode) = vol.resolve_path("a/b").unwrap();
        assert!(inode.is_dir());
    }

    #[test]
    fn resolve_missing_component_is_not_found() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let err = vol.resolve_path("a/b/x").unwrap_err();
        assert!(
            matches!(err, UfsError::NotFound(ref name) if name.as_str() == "x"),
            "got {err:?}",
        );
        assert!(err.is_lookup_outcome());
    }

    #[test]
    fn resolve_through_a_file_is_not_found() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let err = vol.resolve_path("a/b/c/d").unwrap_err();
        assert!(
            matches!(err, UfsError::NotFound(_) | UfsError::NotDirectory),
            "got {err:?}",
        );
    }

    #[test]
    fn resolve_does_not_filter_hidden_names() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let (_, inode) = vol.resolve_path(".hidden").unwrap();
        assert!(inode.is_regular());
    }

    #[test]
    fn resolve_ignores_redundant_slashes() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        assert!(vol.resolve_path("/a//b/").is_ok());
    }

    #[test]
    fn corrupt_directory_record_aborts_lookup() {
        let (mut image, _) = build_tree_image();
        // Smash the root directory's first record length.
        let vol = Volume::open(&image).unwrap();
        let root = vol.read_inode(InodeNumber::ROOT).unwrap();
        let RunSource::Disk(off) = vol.enumerate_runs(&root).unwrap()[0].source else {
            panic!("root directory should be on disk");
        };
        drop(vol);
        let start = off.0 as usize;
        image[start + 4..start + 6].copy_from_slice(&0xFFFF_u16.to_le_bytes());

        let vol = Volume::open(&image).unwrap();
        let err = vol.resolve_path("a/b/c").unwrap_err();
        assert!(matches!(err, UfsError::Corruption { .. }), "got {err:?}");
    }

    // ── Tree walking ────────────────────────────────────────────────────

    #[test]
    fn walk_lists_tree_with_indentation() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let mut out = Vec::new();
        vol.walk_tree(&mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert_eq!(listing, "a:\n    b:\n        c\nf.txt\n");
    }

    #[test]
    fn walk_is_deterministic() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let mut first = Vec::new();
        let mut second = Vec::new();
        vol.walk_tree(&mut first).unwrap();
        vol.walk_tree(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn walk_omits_hidden_entries() {
        let (image, _) = build_tree_image();
        let vol = Volume::open(&image).unwrap();
        let mut out = Vec::new();
        vol.walk_tree(&mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert!(!listing.contains(".hidden"));
        assert!(!listing.contains(".."));
    }

    #[test]
    fn directory_hole_ends_the_scan() {
        let mut b = ImageBuilder::new();
        let f = b.add_file(b"data");
        b.add_dir(2, 2, &[(b"only", f, FileType::RegFile)]);
        // Claim a second block the directory does not have.
        let base = ImageBuilder::inode_offset(2);
        put_u64(&mut b.image, base + 16, 2 * BSIZE);

        let vol = Volume::open(&b.image).unwrap();
        let mut out = Vec::new();
        vol.walk_tree(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "only\n");
        assert!(vol.resolve_path("only").is_ok());
    }
}
