mod config_cipher;
mod error;
mod firmware;
mod utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use crate::error::{Result, Warning};
use crate::firmware::{checksum, info as fw_info, models, pack, unpack};

#[derive(Parser, Debug)]
#[command(name = "fwup-tool", version)]
#[command(
    about = "Unpack, repack and fix TP-Link fwup-ptn firmware, and decrypt/encrypt config backups"
)]
struct Args {
    #[arg(short, long, global = true, help = "Verbose output for debugging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a firmware image into one file per partition
    Unpack {
        file: PathBuf,
        #[arg(short, long, help = "Output directory (default: <file stem>_extracted)")]
        root: Option<PathBuf>,
        #[arg(short, long, help = "Model key, see `models`")]
        model: Option<String>,
    },

    /// Build a firmware image from a directory of partition files
    Pack {
        #[arg(short, long, help = "Directory holding the partition files", default_value = ".")]
        root: PathBuf,
        #[arg(short, long, help = "Model key; without it the .header sidecar is used")]
        model: Option<String>,
        #[arg(short, long, help = "Output image (default: <root name>.bin beside root)")]
        output: Option<PathBuf>,
    },

    /// Check the MD5 stored in a firmware header
    #[command(name = "check-md5")]
    CheckMd5 {
        file: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Write the correct MD5 into a firmware header
    #[command(name = "fix-md5")]
    FixMd5 {
        file: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Decrypt an exported config backup
    #[command(name = "decrypt-config")]
    DecryptConfig {
        file: PathBuf,
        #[arg(short, long, help = "Output file (default: <file>.dec)")]
        output: Option<PathBuf>,
    },

    /// Encrypt a config file for import
    #[command(name = "encrypt-config")]
    EncryptConfig {
        file: PathBuf,
        #[arg(short, long, help = "Output file (default: <file>.enc)")]
        output: Option<PathBuf>,
    },

    /// Print the header and partition table of a firmware image
    Info { file: PathBuf },

    /// List the known models
    Models,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn default_unpack_dir(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "firmware".to_string());
    file.with_file_name(format!("{}_extracted", stem))
}

fn report(warnings: &[Warning]) {
    for w in warnings {
        warn!("{}", w);
    }
}

/// Returns the process exit status.
fn run(command: Command) -> Result<u8> {
    match command {
        Command::Unpack { file, root, model } => {
            let root = root.unwrap_or_else(|| default_unpack_dir(&file));
            info!("Unpacking {} into {}", file.display(), root.display());
            let summary = unpack::unpack(&file, &root, model.as_deref())?;
            report(&summary.warnings);
            if let Some(m) = summary.model {
                info!("Sidecar saved for model {}", m.name);
            }
            info!(
                "\nExtraction finished! {} partitions, header says {} bytes",
                summary.entries.len(),
                summary.header.total_size
            );
        }

        Command::Pack { root, model, output } => {
            let output = output.unwrap_or_else(|| pack::default_output(&root));
            let summary = pack::pack(&root, model.as_deref(), &output)?;
            info!(
                "Packed {} partitions, total size {}",
                summary.entries.len(),
                summary.header.total_size
            );
        }

        Command::CheckMd5 { file, model } => {
            let model = models::resolve(model.as_deref())?;
            if model.is_none() {
                if let Some(detected) = checksum::detect_model(&file)? {
                    info!(
                        "Image matches {}, pass --model {} to check against it",
                        detected.name, detected.name
                    );
                }
            }
            let verification = checksum::verify(&file, checksum::placeholder_for(model))?;
            info!("Stored:   {}", hex::encode(verification.stored));
            info!("Computed: {}", hex::encode(verification.computed));
            if !verification.is_valid() {
                error!("MD5 mismatch");
                return Ok(2);
            }
            info!("MD5 OK");
        }

        Command::FixMd5 { file, model } => {
            let model = models::resolve(model.as_deref())?;
            if checksum::fix(&file, checksum::placeholder_for(model))? {
                info!("MD5 fixed");
            } else {
                info!("MD5 already correct, nothing to do");
            }
        }

        Command::DecryptConfig { file, output } => {
            let output = output.unwrap_or_else(|| with_suffix(&file, ".dec"));
            let warning = config_cipher::decrypt_file(&file, &output)?;
            report(warning.as_slice());
        }

        Command::EncryptConfig { file, output } => {
            let output = output.unwrap_or_else(|| with_suffix(&file, ".enc"));
            config_cipher::encrypt_file(&file, &output)?;
        }

        Command::Info { file } => {
            let image = fw_info::inspect(&file)?;
            println!("File size: {}", image.file_len);
            println!("Total size: {}", image.header.total_size);
            println!("Checksum: {}", hex::encode(image.header.checksum));
            println!("Vendor: {}", image.header.vendor());
            println!("Model ID: {}", hex::encode(image.header.model_id));
            match image.model {
                Some(m) => {
                    let state = if image.checksum_fixed { "fixed" } else { "placeholder" };
                    println!("Model: {} (checksum {})", m.name, state);
                }
                None => println!("Model: unknown"),
            }
            if let Some(m) = models::find_model_by_id(&image.header.model_id) {
                println!("Model ID matches: {}", m.name);
            }
            println!("\nPartitions:");
            for entry in &image.entries {
                println!(
                    "  {:<20} base {:#010x} size {:#010x}",
                    entry.name, entry.base, entry.size
                );
            }
        }

        Command::Models => {
            for m in models::MODELS {
                println!(
                    "{:<12} id {} placeholder {} vendor {:?}",
                    m.name,
                    hex::encode(m.id),
                    hex::encode(m.checksum_placeholder),
                    m.vendor_name
                );
            }
        }
    }

    Ok(0)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    match run(args.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
