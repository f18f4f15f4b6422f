use std::path::Path;

use crate::error::{FwError, Result};
use crate::firmware::checksum;
use crate::firmware::include::*;
use crate::firmware::models::Model;
use crate::firmware::ptn_table::{self, PartitionTableEntry};
use crate::utils::common;

pub struct ImageInfo {
    pub file_len: usize,
    pub header: Header,
    pub entries: Vec<PartitionTableEntry>,
    pub model: Option<&'static Model>,
    /// The stored checksum is a valid digest for the detected model.
    pub checksum_fixed: bool,
}

pub fn inspect(path: &Path) -> Result<ImageInfo> {
    let data = common::read_all(path)?;
    if data.len() < HEADER_SIZE {
        return Err(FwError::HeaderCorrupted { expected: HEADER_SIZE, actual: data.len() });
    }
    let header = Header::decode(&data[..HEADER_SIZE])?;
    let entries = ptn_table::decode(&data[HEADER_SIZE..], PTN_TABLE_SIZE)?;

    let model = checksum::detect_model_data(&data)?;
    let checksum_fixed = match model {
        Some(m) => checksum::verify_data(&data, &m.checksum_placeholder)?.is_valid(),
        None => false,
    };

    Ok(ImageInfo { file_len: data.len(), header, entries, model, checksum_fixed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::pack::{pack, tests::write_parts};

    #[test]
    fn reports_packed_image() {
        let dir = tempfile::tempdir().unwrap();
        let parts = dir.path().join("parts");
        write_parts(&parts, &[(PTN_TABLE_NAME, &b""[..]), ("os", &b"kernel"[..])]);
        let output = dir.path().join("fw.bin");
        pack(&parts, Some("WVR300V1"), &output).unwrap();

        let info = inspect(&output).unwrap();
        assert_eq!(info.file_len, container_size(6));
        assert_eq!(info.header.total_size as usize, info.file_len);
        assert_eq!(info.entries.len(), 2);
        assert_eq!(info.model.map(|m| m.name), Some("WVR300V1"));
        assert!(info.checksum_fixed);
    }

    #[test]
    fn truncated_header_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [0u8; 10]).unwrap();
        assert!(matches!(inspect(file.path()), Err(FwError::HeaderCorrupted { .. })));
    }
}
