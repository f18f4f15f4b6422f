use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort an operation.
#[derive(Error, Debug)]
pub enum FwError {
    #[error("no .header sidecar in {} and no model given, pass --model", .0.display())]
    HeaderMissing(PathBuf),

    #[error("header is corrupted: expected {expected} bytes, got {actual}")]
    HeaderCorrupted { expected: usize, actual: usize },

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("partition table is malformed: {0}")]
    TableMalformed(String),

    #[error("partition table does not fit: {needed} bytes needed, region is {region}")]
    TableOverflow { needed: usize, region: usize },

    #[error("no partition-table file in {}", .0.display())]
    PartitionTableMissing(PathBuf),

    #[error("partition {name} ends at {end:#x}, past the end of the file ({len:#x})")]
    PartitionOutOfRange { name: String, end: u64, len: u64 },

    #[error("invalid partition name: {0:?}")]
    InvalidPartitionName(String),

    #[error("config blob is malformed: length {0} is not a whole number of blocks")]
    ConfigMalformed(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("binary layout error: {0}")]
    Binrw(#[from] binrw::Error),
}

/// Conditions worth reporting that do not stop the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("MD5 mismatch for {model}: stored {stored}, computed {computed}")]
    ChecksumMismatch { model: String, stored: String, computed: String },

    #[error("could not detect the firmware model, falling back to the default placeholder")]
    ModelUndetected,

    #[error("config MD5 mismatch: stored {stored}, computed {computed}")]
    ConfigDigestMismatch { stored: String, computed: String },
}

pub type Result<T> = std::result::Result<T, FwError>;
