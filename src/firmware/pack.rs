use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{FwError, Result};
use crate::firmware::checksum;
use crate::firmware::include::*;
use crate::firmware::models::{self, Model};
use crate::firmware::ptn_table::{self, PartitionTableEntry, TERMINATOR_WINDOW};
use crate::utils::common;

pub struct Partition {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct PackSummary {
    pub header: Header,
    pub entries: Vec<PartitionTableEntry>,
}

/// Reads every visible file in `root` except `exclude`, `partition-table` first.
pub fn load_partitions(root: &Path, exclude: Option<&Path>) -> Result<Vec<Partition>> {
    let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());

    let mut partitions = Vec::new();
    for dir_entry in fs::read_dir(root)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name().to_string_lossy().to_string();
        let path = dir_entry.path();
        if name.starts_with('.') || path.is_dir() {
            continue;
        }
        if excluded.is_some() && fs::canonicalize(&path).ok() == excluded {
            warn!("Skipping {}, it is the output image", name);
            continue;
        }
        ptn_table::check_name(&name)?;
        let data = common::read_all(&path)?;
        debug!("Loaded {} ({} bytes)", name, data.len());
        partitions.push(Partition { name, data });
    }

    let table_index = partitions
        .iter()
        .position(|p| p.name == PTN_TABLE_NAME)
        .ok_or_else(|| FwError::PartitionTableMissing(root.to_path_buf()))?;
    let table = partitions.remove(table_index);

    // A table left behind by unpack gives the original physical order.
    let recorded: Vec<String> = match ptn_table::decode(&table.data, PTN_TABLE_SIZE) {
        Ok(entries) => entries.into_iter().map(|e| e.name).collect(),
        Err(e) => {
            debug!("{} is not a table ({}), ordering by name", PTN_TABLE_NAME, e);
            Vec::new()
        }
    };
    partitions.sort_by(|a, b| a.name.cmp(&b.name));
    partitions.sort_by_key(|p| {
        recorded.iter().position(|n| *n == p.name).unwrap_or(usize::MAX)
    });

    partitions.insert(0, table);
    Ok(partitions)
}

fn header_for_model(model: &Model) -> Header {
    Header {
        total_size: 0,
        checksum: model.checksum_placeholder,
        vendor_name: common::padded_bytes(model.vendor_name),
        model_id: model.id,
    }
}

/// Explicit model first, then the `.header` sidecar from an earlier unpack.
pub fn resolve_header(root: &Path, model: Option<&Model>) -> Result<Header> {
    if let Some(m) = model {
        return Ok(header_for_model(m));
    }
    let sidecar_path = root.join(SIDECAR_NAME);
    if !sidecar_path.is_file() {
        return Err(FwError::HeaderMissing(root.to_path_buf()));
    }
    Header::decode(&common::read_all(&sidecar_path)?)
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        FwError::TableMalformed(format!("{} {:#x} does not fit in 32 bits", what, value))
    })
}

/// Table at `[0, PTN_TABLE_SIZE)`, everything else packed contiguously after it.
pub fn layout(partitions: &[Partition]) -> Result<Vec<PartitionTableEntry>> {
    let mut entries = Vec::with_capacity(partitions.len());
    let mut next_base = PTN_TABLE_SIZE as u64;

    for (i, part) in partitions.iter().enumerate() {
        if i == 0 {
            entries.push(PartitionTableEntry::new(part.name.clone(), 0, PTN_TABLE_SIZE as u32));
            continue;
        }
        let size = part.data.len() as u64;
        entries.push(PartitionTableEntry::new(
            part.name.clone(),
            to_u32(next_base, "base of")?,
            to_u32(size, "size")?,
        ));
        next_base += size;
    }

    Ok(entries)
}

pub fn build_image(
    mut header: Header,
    partitions: &[Partition],
) -> Result<(Vec<u8>, PackSummary)> {
    let entries = layout(partitions)?;
    let table = ptn_table::encode(&entries, PTN_TABLE_SIZE)?;
    if !ptn_table::terminator_in_window(&table) {
        warn!(
            "Partition table text is longer than {} bytes, unpack will not be able to read it",
            TERMINATOR_WINDOW
        );
    }

    let payload_len: usize = partitions.iter().skip(1).map(|p| p.data.len()).sum();
    header.total_size = to_u32(container_size(payload_len) as u64, "total size")?;

    let mut image = header.encode()?;
    image.reserve(PTN_TABLE_SIZE + payload_len);
    image.extend_from_slice(&table);
    for part in partitions.iter().skip(1) {
        image.extend_from_slice(&part.data);
    }

    Ok((image, PackSummary { header, entries }))
}

pub fn pack(root: &Path, model_key: Option<&str>, output: &Path) -> Result<PackSummary> {
    let model = models::resolve(model_key)?;
    let partitions = load_partitions(root, Some(output))?;
    let header = resolve_header(root, model)?;
    let placeholder = header.checksum;

    let (image, summary) = build_image(header, &partitions)?;
    for (i, entry) in summary.entries.iter().enumerate() {
        info!(
            "({}/{}) - {}, Base: {:#x}, Size: {:#x}",
            i + 1,
            summary.entries.len(),
            entry.name,
            entry.base,
            entry.size
        );
    }

    common::write_file(output, &image)?;
    checksum::fix(output, &placeholder)?;
    info!("Saved {} ({} bytes)", output.display(), image.len());

    Ok(summary)
}

/// `<root name>.bin` next to `root`.
pub fn default_output(root: &Path) -> PathBuf {
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "firmware".to_string());
    root.with_file_name(format!("{}.bin", name))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn write_parts(dir: &Path, parts: &[(&str, &[u8])]) {
        fs::create_dir_all(dir).unwrap();
        for (name, data) in parts {
            fs::write(dir.join(name), data).unwrap();
        }
    }

    #[test]
    fn places_first_partition_after_table() {
        let dir = tempfile::tempdir().unwrap();
        let parts = dir.path().join("parts");
        write_parts(&parts, &[(PTN_TABLE_NAME, &b"anything"[..]), ("os", &[7u8; 16][..])]);

        let output = dir.path().join("fw.bin");
        let summary = pack(&parts, Some("WVR300V1"), &output).unwrap();

        assert_eq!(summary.entries[0], PartitionTableEntry::new(PTN_TABLE_NAME, 0, 2048));
        assert_eq!(summary.entries[1], PartitionTableEntry::new("os", 2048, 16));
        assert_eq!(summary.header.total_size as usize, 92 + 2048 + 16);

        let image = fs::read(&output).unwrap();
        assert_eq!(image.len(), 92 + 2048 + 16);
        assert_eq!(&image[..4], &(92u32 + 2048 + 16).to_be_bytes());
        assert_eq!(&image[HEADER_SIZE + PTN_TABLE_SIZE..], &[7u8; 16]);
        let model = models::find_model("WVR300V1").unwrap();
        assert!(checksum::verify(&output, &model.checksum_placeholder).unwrap().is_valid());
    }

    #[test]
    fn table_goes_first_and_recorded_order_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let table = ptn_table::encode(
            &[
                PartitionTableEntry::new(PTN_TABLE_NAME, 0, 0x800),
                PartitionTableEntry::new("zeta", 0x800, 1),
                PartitionTableEntry::new("alpha", 0x801, 1),
            ],
            PTN_TABLE_SIZE,
        )
        .unwrap();
        write_parts(dir.path(), &[
            ("beta", &b"b"[..]),
            ("alpha", &b"a"[..]),
            (PTN_TABLE_NAME, &table[..]),
            ("zeta", &b"z"[..]),
            (".hidden", &b"h"[..]),
        ]);
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let names: Vec<String> =
            load_partitions(dir.path(), None).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, [PTN_TABLE_NAME, "zeta", "alpha", "beta"]);
    }

    #[test]
    fn missing_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_parts(dir.path(), &[("os", &b"kernel"[..])]);
        assert!(matches!(
            pack(dir.path(), Some("WVR300V1"), &dir.path().join("fw.bin")),
            Err(FwError::PartitionTableMissing(_))
        ));
    }

    #[test]
    fn unknown_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_parts(dir.path(), &[(PTN_TABLE_NAME, &b""[..])]);
        assert!(matches!(
            pack(dir.path(), Some("TL-NOPE"), &dir.path().join("fw.bin")),
            Err(FwError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn header_needs_model_or_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(resolve_header(dir.path(), None), Err(FwError::HeaderMissing(_))));

        fs::write(dir.path().join(SIDECAR_NAME), [0u8; 40]).unwrap();
        assert!(matches!(
            resolve_header(dir.path(), None),
            Err(FwError::HeaderCorrupted { expected: HEADER_SIZE, actual: 40 })
        ));

        let model = models::find_model("WVR300V1").unwrap();
        let header = resolve_header(dir.path(), Some(model)).unwrap();
        assert_eq!(header.checksum, model.checksum_placeholder);
        assert_eq!(header.vendor(), model.vendor_name);
    }

    #[test]
    fn sidecar_header_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = Header {
            total_size: 0,
            checksum: [0x33; 16],
            vendor_name: common::padded_bytes("Other Vendor"),
            model_id: [4; 8],
        };
        fs::write(dir.path().join(SIDECAR_NAME), sidecar.encode().unwrap()).unwrap();
        write_parts(dir.path(), &[(PTN_TABLE_NAME, &b""[..]), ("os", &b"1234"[..])]);

        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("fw.bin");
        let summary = pack(dir.path(), None, &output).unwrap();
        assert_eq!(summary.header.model_id, [4; 8]);
        assert_eq!(summary.header.vendor(), "Other Vendor");
        assert!(checksum::verify(&output, &[0x33; 16]).unwrap().is_valid());
    }

    #[test]
    fn names_the_table_cannot_carry_are_rejected() {
        for bad in ["boot loader", "ядро"] {
            let dir = tempfile::tempdir().unwrap();
            let parts = dir.path().join("parts");
            write_parts(&parts, &[
                (PTN_TABLE_NAME, &b""[..]),
                (bad, &b"loader"[..]),
                ("os", &b"kernel"[..]),
            ]);

            let output = dir.path().join("fw.bin");
            assert!(matches!(
                pack(&parts, Some("WVR300V1"), &output),
                Err(FwError::InvalidPartitionName(ref n)) if n == bad
            ));
            assert!(!output.exists());
        }
    }

    #[test]
    fn previous_output_inside_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_parts(dir.path(), &[(PTN_TABLE_NAME, &b""[..]), ("os", &b"kernel"[..])]);
        let output = dir.path().join("fw.bin");

        let first = pack(dir.path(), Some("WVR300V1"), &output).unwrap();
        let first_image = fs::read(&output).unwrap();
        let second = pack(dir.path(), Some("WVR300V1"), &output).unwrap();

        assert_eq!(second.entries, first.entries);
        assert_eq!(fs::read(&output).unwrap(), first_image);
    }

    #[test]
    fn long_table_still_builds() {
        let partitions = vec![
            Partition { name: PTN_TABLE_NAME.to_string(), data: Vec::new() },
            Partition { name: "a".repeat(TERMINATOR_WINDOW), data: vec![1, 2, 3] },
        ];
        let model = models::find_model("WVR300V1").unwrap();
        let (image, summary) = build_image(header_for_model(model), &partitions).unwrap();

        assert_eq!(summary.header.total_size as usize, container_size(3));
        let table = &image[HEADER_SIZE..HEADER_SIZE + PTN_TABLE_SIZE];
        assert!(!ptn_table::terminator_in_window(table));
    }
}
