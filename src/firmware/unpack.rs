use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{FwError, Result, Warning};
use crate::firmware::checksum;
use crate::firmware::include::*;
use crate::firmware::models::{self, Model};
use crate::firmware::ptn_table::{self, PartitionTableEntry};
use crate::utils::common;

#[derive(Debug)]
pub struct UnpackSummary {
    pub header: Header,
    pub entries: Vec<PartitionTableEntry>,
    pub model: Option<&'static Model>,
    pub warnings: Vec<Warning>,
}

pub fn unpack(
    file_path: &Path,
    output_dir: &Path,
    model_key: Option<&str>,
) -> Result<UnpackSummary> {
    let model = models::resolve(model_key)?;
    let data = common::read_all(file_path)?;
    if data.len() < HEADER_SIZE {
        return Err(FwError::HeaderCorrupted { expected: HEADER_SIZE, actual: data.len() });
    }

    let header = Header::decode(&data[..HEADER_SIZE])?;
    info!(
        "Vendor: {}\nModel ID: {}\nTotal size: {} (file is {})",
        header.vendor(),
        hex::encode(header.model_id),
        header.total_size,
        data.len()
    );

    let body = &data[HEADER_SIZE..];
    let entries = ptn_table::decode(body, PTN_TABLE_SIZE)?;

    for entry in &entries {
        // names become file names in output_dir
        ptn_table::check_name(&entry.name)?;
        if entry.end() > body.len() as u64 {
            return Err(FwError::PartitionOutOfRange {
                name: entry.name.clone(),
                end: HEADER_SIZE as u64 + entry.end(),
                len: data.len() as u64,
            });
        }
    }

    fs::create_dir_all(output_dir)?;
    for (i, entry) in entries.iter().enumerate() {
        info!(
            "({}/{}) - {}, Base: {:#x}, Size: {:#x}",
            i + 1,
            entries.len(),
            entry.name,
            entry.base,
            entry.size
        );
        let part = &body[entry.base as usize..entry.end() as usize];
        common::write_file(&output_dir.join(&entry.name), part)?;
        info!("- Saved file!");
    }

    let mut warnings = Vec::new();
    let (placeholder, model) = match model {
        Some(m) => {
            let verification = checksum::verify_data(&data, &m.checksum_placeholder)?;
            if !verification.is_valid() {
                warnings.push(Warning::ChecksumMismatch {
                    model: m.name.to_string(),
                    stored: hex::encode(verification.stored),
                    computed: hex::encode(verification.computed),
                });
            }
            (m.checksum_placeholder, Some(m))
        }
        None => match checksum::detect_model_data(&data)? {
            Some(m) => {
                info!("Detected model: {}", m.name);
                (m.checksum_placeholder, Some(m))
            }
            None => {
                warnings.push(Warning::ModelUndetected);
                (*models::default_placeholder(), None)
            }
        },
    };

    let sidecar = Header { checksum: placeholder, ..header.clone() };
    common::write_atomic(&output_dir.join(SIDECAR_NAME), &sidecar.encode()?)?;
    debug!("Saved header sidecar with placeholder {}", hex::encode(placeholder));

    Ok(UnpackSummary { header, entries, model, warnings })
}
