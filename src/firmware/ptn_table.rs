use log::debug;

use crate::error::{FwError, Result};

pub const RECORD_SEPARATOR: &str = "\t\r\n";
/// The zero terminator must appear within this many bytes of the region start.
pub const TERMINATOR_WINDOW: usize = 1024;
const PAD_BYTE: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTableEntry {
    pub name: String,
    /// Offset relative to the first byte after the header.
    pub base: u32,
    pub size: u32,
    /// Key/value pairs other than `fwup-ptn`, `base` and `size`, in record order.
    pub extra: Vec<(String, String)>,
}
impl PartitionTableEntry {
    pub fn new(name: impl Into<String>, base: u32, size: u32) -> Self {
        PartitionTableEntry { name: name.into(), base, size, extra: Vec::new() }
    }

    pub fn end(&self) -> u64 {
        self.base as u64 + self.size as u64
    }
}

/// A name must be one whitespace-free ASCII token that is also a plain, visible file name.
pub fn check_name(name: &str) -> Result<()> {
    let is_token = !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic());
    if !is_token || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(FwError::InvalidPartitionName(name.to_string()));
    }
    Ok(())
}

/// Whether an encoded region's terminator is where `decode` will look for it.
pub fn terminator_in_window(region: &[u8]) -> bool {
    region.iter().take(TERMINATOR_WINDOW).any(|&b| b == 0)
}

pub fn decode(region: &[u8], region_size: usize) -> Result<Vec<PartitionTableEntry>> {
    let region = &region[..region.len().min(region_size)];
    let window = &region[..region.len().min(TERMINATOR_WINDOW)];

    let text_end = window.iter().position(|&b| b == 0).ok_or_else(|| {
        FwError::TableMalformed(format!("no terminator in the first {} bytes", TERMINATOR_WINDOW))
    })?;
    let text = &region[..text_end];
    if !text.is_ascii() {
        return Err(FwError::TableMalformed("table text is not ASCII".to_string()));
    }
    let text = String::from_utf8_lossy(text);

    let mut entries = Vec::new();
    for record in text.split(RECORD_SEPARATOR) {
        let tokens: Vec<&str> = record.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() % 2 != 0 {
            debug!("Skipping partition record with odd token count: {:?}", record);
            continue;
        }
        entries.push(parse_record(&tokens)?);
    }

    Ok(entries)
}

fn parse_record(tokens: &[&str]) -> Result<PartitionTableEntry> {
    let mut name = None;
    let mut base = None;
    let mut size = None;
    let mut extra = Vec::new();

    for pair in tokens.chunks_exact(2) {
        let (key, value) = (pair[0], pair[1]);
        match key {
            "fwup-ptn" => name = Some(value.to_string()),
            "base" => base = Some(parse_hex(value)?),
            "size" => size = Some(parse_hex(value)?),
            _ => extra.push((key.to_string(), value.to_string())),
        }
    }

    let record = tokens.join(" ");
    let missing =
        |field: &str| FwError::TableMalformed(format!("record {:?} has no {}", record, field));
    Ok(PartitionTableEntry {
        name: name.ok_or_else(|| missing("fwup-ptn"))?,
        base: base.ok_or_else(|| missing("base"))?,
        size: size.ok_or_else(|| missing("size"))?,
        extra,
    })
}

fn parse_hex(value: &str) -> Result<u32> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    u32::from_str_radix(digits, 16)
        .map_err(|_| FwError::TableMalformed(format!("bad hex value {:?}", value)))
}

pub fn encode(entries: &[PartitionTableEntry], region_size: usize) -> Result<Vec<u8>> {
    let mut text = String::new();
    for entry in entries {
        check_name(&entry.name)?;
        text.push_str(&format!(
            "fwup-ptn {} base {:#x} size {:#x}",
            entry.name, entry.base, entry.size
        ));
        for (key, value) in &entry.extra {
            text.push_str(&format!(" {} {}", key, value));
        }
        text.push_str(RECORD_SEPARATOR);
    }

    let mut out = text.into_bytes();
    out.push(0);
    if out.len() > region_size {
        return Err(FwError::TableOverflow { needed: out.len(), region: region_size });
    }
    out.resize(region_size, PAD_BYTE);

    Ok(out)
}
