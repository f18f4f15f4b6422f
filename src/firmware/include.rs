use std::io::Cursor;

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};

use crate::error::{FwError, Result};
use crate::utils::common;

pub const HEADER_SIZE: usize = 92;
pub const PTN_TABLE_SIZE: usize = 2048;

/// `total_size` (4) + `checksum` (16); the digest covers everything after this.
pub const CHECKSUM_OFFSET: usize = 4;
pub const CHECKSUM_END: usize = 20;

pub const PTN_TABLE_NAME: &str = "partition-table";
pub const SIDECAR_NAME: &str = ".header";

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct Header {
    pub total_size: u32,
    pub checksum: [u8; 16],
    pub vendor_name: [u8; 64],
    pub model_id: [u8; 8],
}
impl Header {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(FwError::HeaderCorrupted { expected: HEADER_SIZE, actual: bytes.len() });
        }
        let header: Header = Cursor::new(bytes).read_be()?;
        Ok(header)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        writer.write_be(self)?;
        Ok(writer.into_inner())
    }

    pub fn vendor(&self) -> String {
        common::string_from_bytes(&self.vendor_name)
    }
}

/// Size of a container holding `payload_len` bytes of partitions after the table.
pub fn container_size(payload_len: usize) -> usize {
    HEADER_SIZE + PTN_TABLE_SIZE + payload_len
}
