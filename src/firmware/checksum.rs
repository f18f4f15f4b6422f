use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::error::{FwError, Result};
use crate::firmware::include::{CHECKSUM_END, CHECKSUM_OFFSET};
use crate::firmware::models::{self, Model, MODELS};
use crate::utils::common;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub stored: [u8; 16],
    pub computed: [u8; 16],
}
impl Verification {
    pub fn is_valid(&self) -> bool {
        self.stored == self.computed
    }
}

pub fn placeholder_for(model: Option<&Model>) -> &[u8; 16] {
    match model {
        Some(m) => &m.checksum_placeholder,
        None => models::default_placeholder(),
    }
}

/// MD5 over `placeholder` followed by everything after the checksum field.
pub fn compute(data: &[u8], placeholder: &[u8; 16]) -> Result<[u8; 16]> {
    if data.len() < CHECKSUM_END {
        return Err(FwError::HeaderCorrupted { expected: CHECKSUM_END, actual: data.len() });
    }
    let mut ctx = md5::Context::new();
    ctx.consume(placeholder);
    ctx.consume(&data[CHECKSUM_END..]);
    Ok(ctx.compute().0)
}

pub fn verify_data(data: &[u8], placeholder: &[u8; 16]) -> Result<Verification> {
    let computed = compute(data, placeholder)?;
    let mut stored = [0u8; 16];
    stored.copy_from_slice(&data[CHECKSUM_OFFSET..CHECKSUM_END]);
    Ok(Verification { stored, computed })
}

pub fn verify(path: &Path, placeholder: &[u8; 16]) -> Result<Verification> {
    let data = common::read_all(path)?;
    verify_data(&data, placeholder)
}

/// Writes the computed digest into the checksum field. Returns false if it was already valid.
pub fn fix(path: &Path, placeholder: &[u8; 16]) -> Result<bool> {
    let verification = verify(path, placeholder)?;
    if verification.is_valid() {
        debug!("Checksum already valid: {}", hex::encode(verification.stored));
        return Ok(false);
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(CHECKSUM_OFFSET as u64))?;
    file.write_all(&verification.computed)?;
    debug!(
        "Checksum {} -> {}",
        hex::encode(verification.stored),
        hex::encode(verification.computed)
    );

    Ok(true)
}

/// Finds the model whose placeholder produced the stored digest, or which
/// still carries its placeholder verbatim (an image awaiting a fix).
pub fn detect_model_data(data: &[u8]) -> Result<Option<&'static Model>> {
    for model in MODELS {
        let verification = verify_data(data, &model.checksum_placeholder)?;
        if verification.is_valid() || verification.stored == model.checksum_placeholder {
            return Ok(Some(model));
        }
    }
    Ok(None)
}

pub fn detect_model(path: &Path) -> Result<Option<&'static Model>> {
    let data = common::read_all(path)?;
    detect_model_data(&data)
}
