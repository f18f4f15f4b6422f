use crate::error::{FwError, Result};

/// A known device variant and the header defaults used when building its firmware.
#[derive(Debug, PartialEq, Eq)]
pub struct Model {
    pub name: &'static str,
    pub id: [u8; 8],
    pub checksum_placeholder: [u8; 16],
    pub vendor_name: &'static str,
}

pub static MODELS: &[Model] = &[
    Model {
        name: "WVR300V1",
        id: [0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
        checksum_placeholder: [
            0x7a, 0x2b, 0x15, 0xed, 0x9b, 0x98, 0x59, 0x6d,
            0xe5, 0x04, 0xab, 0x44, 0xac, 0x2a, 0x9f, 0x4e,
        ],
        vendor_name: "TP-LINK Technologies",
    },
];

/// Placeholder used when no model is known.
pub fn default_placeholder() -> &'static [u8; 16] {
    &MODELS[0].checksum_placeholder
}

pub fn find_model(key: &str) -> Option<&'static Model> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(key))
}

/// Resolves an optional user-supplied key; an unknown key is an error, not `None`.
pub fn resolve(key: Option<&str>) -> Result<Option<&'static Model>> {
    match key {
        Some(k) => find_model(k).map(Some).ok_or_else(|| FwError::UnsupportedModel(k.to_string())),
        None => Ok(None),
    }
}

pub fn find_model_by_id(id: &[u8; 8]) -> Option<&'static Model> {
    MODELS.iter().find(|m| &m.id == id)
}
