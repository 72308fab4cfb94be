//! Cylinder-group geometry arithmetic.
//!
//! Pure functions of the superblock and an input number; no state, no I/O.
//! Every byte offset the traversal engine uses is composed from these —
//! callers never perform ad hoc address arithmetic. All multiplications are
//! checked; `None` means the geometry produced an implausible address.

use ufsview_ondisk::Superblock;
use ufsview_types::{ByteOffset, CgIndex, FragNumber, InodeNumber, UFS2_DINODE_SIZE};

/// Byte offset of a fragment from the volume start.
#[must_use]
pub fn frag_offset(sb: &Superblock, frag: FragNumber) -> Option<ByteOffset> {
    frag.to_byte_offset(sb.fsize)
}

/// Cylinder group owning a fragment number.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // group count is u32 on disk
pub fn cg_of_frag(sb: &Superblock, frag: FragNumber) -> CgIndex {
    CgIndex((frag.0 / u64::from(sb.fpg)) as u32)
}

/// Cylinder group owning an inode number.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // group count is u32 on disk
pub fn cg_of_inode(sb: &Superblock, ino: InodeNumber) -> CgIndex {
    CgIndex((ino.0 / u64::from(sb.ipg)) as u32)
}

/// First data fragment of a cylinder group.
#[must_use]
pub fn cg_data_base(sb: &Superblock, cg: CgIndex) -> FragNumber {
    FragNumber(u64::from(cg.0) * u64::from(sb.fpg))
}

/// Fragment where the inode table of the owning cylinder group begins.
#[must_use]
pub fn cg_inode_base(sb: &Superblock, ino: InodeNumber) -> Option<FragNumber> {
    cg_data_base(sb, cg_of_inode(sb, ino)).checked_add(u64::from(sb.iblkno))
}

/// Fragment number relative to its cylinder group's data base.
#[must_use]
pub fn frag_offset_in_group(sb: &Superblock, frag: FragNumber) -> FragNumber {
    FragNumber(frag.0 % u64::from(sb.fpg))
}

/// Position of an inode within its group's inode table.
#[must_use]
pub fn inode_index_in_group(sb: &Superblock, ino: InodeNumber) -> u64 {
    ino.0 % u64::from(sb.ipg)
}

/// Byte offset of a data block, composed from the group base and the
/// block's offset within its group.
#[must_use]
pub fn data_offset(sb: &Superblock, frag: FragNumber) -> Option<ByteOffset> {
    let base = cg_data_base(sb, cg_of_frag(sb, frag));
    let within = frag_offset_in_group(sb, frag);
    frag_offset(sb, base.checked_add(within.0)?)
}

/// Byte offset of an inode record, composed from the group's inode-table
/// base and the inode's index scaled by the fixed record size.
#[must_use]
pub fn inode_offset(sb: &Superblock, ino: InodeNumber) -> Option<ByteOffset> {
    let base = frag_offset(sb, cg_inode_base(sb, ino)?)?;
    let index = inode_index_in_group(sb, ino);
    base.checked_add(index.checked_mul(UFS2_DINODE_SIZE as u64)?)
}
