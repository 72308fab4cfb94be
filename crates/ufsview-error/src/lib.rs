#![forbid(unsafe_code)]
//! Error types for ufsview.
//!
//! # Error Taxonomy
//!
//! ufsview uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `ufsview-types` | On-disk format violations detected during byte parsing |
//! | Runtime | `UfsError` | `ufsview-error` (this crate) | User-facing errors for CLI and API consumers |
//!
//! ## Mapping Policy: ParseError → UfsError
//!
//! `ufsview-error` is intentionally independent of `ufsview-types` and
//! `ufsview-ondisk` to avoid cyclic dependencies. The conversion from
//! `ParseError` to `UfsError` is implemented in `ufsview-core`, which depends
//! on both crates.
//!
//! The mapping rules are:
//!
//! | ParseError Variant | UfsError Variant | Rationale |
//! |--------------------|------------------|-----------|
//! | `InsufficientData` | `Corruption { offset, detail }` | Truncated metadata indicates corruption or a truncated image |
//! | `InvalidMagic` | `Format(detail)` | Wrong magic means wrong filesystem type, not corruption |
//! | `InvalidField` | `Format` / `InvalidGeometry` | `ufsview-core` adds open-time validation context |
//! | `IntegerConversion` | `Corruption { offset, detail }` | Arithmetic overflow in parsed values suggests corruption |
//!
//! ## Outcome vs. failure
//!
//! `NotFound`, `NotDirectory`, `IsDirectory`, and `NotRegular` describe
//! normal lookup outcomes (a path that does not resolve, or resolves to the
//! wrong kind of object). They are distinct variants precisely so callers can
//! tell them apart from `Corruption`, which means the image itself is bad.
//!
//! ## errno Mapping
//!
//! Every `UfsError` variant maps to exactly one POSIX errno via
//! [`UfsError::to_errno`]. The mapping is exhaustive (no wildcard arms) so
//! adding a new variant is a compile error until its errno is assigned.
//!
//! | Variant | errno | Constant |
//! |---------|-------|----------|
//! | `Io` | `EIO` | 5 |
//! | `EmptyImage` | `ENODATA` | 61 |
//! | `Corruption` | `EIO` | 5 |
//! | `Format` | `EINVAL` | 22 |
//! | `InvalidGeometry` | `EINVAL` | 22 |
//! | `NotFound` | `ENOENT` | 2 |
//! | `NotDirectory` | `ENOTDIR` | 20 |
//! | `IsDirectory` | `EISDIR` | 21 |
//! | `NotRegular` | `EINVAL` | 22 |
//! | `UnsupportedFeature` | `EOPNOTSUPP` | 95 |

use thiserror::Error;

/// Unified error type for all ufsview operations.
///
/// This is the canonical error type returned by CLI commands and public API
/// surfaces. Internal crate-specific errors (e.g., `ParseError` from
/// `ufsview-types`) are converted into `UfsError` at crate boundaries.
#[derive(Debug, Error)]
pub enum UfsError {
    /// Operating system I/O error (wraps `std::io::Error`).
    ///
    /// Raised when the backing image cannot be read, or when writing
    /// extracted content to the output sink fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing image has length zero.
    ///
    /// Reported before any traversal begins; an empty byte source cannot
    /// contain a superblock.
    #[error("image is empty")]
    EmptyImage,

    /// On-disk metadata corruption detected at a known byte offset.
    ///
    /// Used when a computed offset falls outside the volume, or when live
    /// metadata reads produce structurally invalid data (a directory record
    /// that crosses its block, a negative block pointer). The `offset` field
    /// identifies where the read was attempted.
    #[error("corrupt image at offset {offset}: {detail}")]
    Corruption { offset: u64, detail: String },

    /// Invalid on-disk format (wrong filesystem type, bad magic).
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Superblock geometry is invalid or out of the supported range.
    ///
    /// Used during open-time validation for fragment/block sizes and group
    /// parameters that are numerically invalid. The volume is unreadable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// No directory entry matches a requested path component.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path component resolved to something other than a directory where
    /// a directory was required.
    #[error("not a directory")]
    NotDirectory,

    /// Attempted to extract content from a directory.
    #[error("is a directory")]
    IsDirectory,

    /// Attempted to extract content from a non-regular, non-directory inode
    /// (device node, FIFO, socket, symlink).
    #[error("not a regular file")]
    NotRegular,

    /// The image uses a feature this build does not traverse
    /// (e.g., triple-indirect blocks).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl UfsError {
    /// Convert this error into a POSIX errno.
    ///
    /// The mapping is exhaustive — every variant has an explicit arm. Adding
    /// a new variant without updating this function is a compile error.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::EmptyImage => libc::ENODATA,
            Self::Corruption { .. } => libc::EIO,
            Self::Format(_) | Self::InvalidGeometry(_) | Self::NotRegular => libc::EINVAL,
            Self::NotFound(_) => libc::ENOENT,
            Self::NotDirectory => libc::ENOTDIR,
            Self::IsDirectory => libc::EISDIR,
            Self::UnsupportedFeature(_) => libc::EOPNOTSUPP,
        }
    }

    /// True when this error describes a normal lookup outcome rather than a
    /// damaged or unreadable image.
    #[must_use]
    pub fn is_lookup_outcome(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NotDirectory | Self::IsDirectory | Self::NotRegular
        )
    }
}

/// Result alias using `UfsError`.
pub type Result<T> = std::result::Result<T, UfsError>;
