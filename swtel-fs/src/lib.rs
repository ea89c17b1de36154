//! Filesystem abstraction and interval archive writer.
//!
//! This crate provides:
//! - Filesystem trait for atomic writes and file reads
//! - Archive path layout keyed by interval range and hostname
//! - ArchiveWriter for persisting a flush's documents as JSONL

pub mod archive;
pub mod filesystem;

pub use archive::{
    archive_path, format_archive_time, ArchiveWriter, JsonlArchiveWriter,
    MockArchiveWriter,
};
pub use filesystem::{Filesystem, FsError, MockFilesystem, RealFilesystem};
