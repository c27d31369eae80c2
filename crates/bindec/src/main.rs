//! bindec - Decode binary files into a readable dump
//!
//! The layout of the input is described by a JSON format file; shared
//! defaults and type definitions come from a config file kept next to the
//! executable.

use anyhow::{bail, Context, Result};
use bindec_core::config::{self, STANDARD_CONFIG};
use bindec_core::{render, FieldDef, RenderOutcome, Session, SessionConfig};
use clap::Parser;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE_NAME: &str = "bindec.cfg";
const BACKUP_SUFFIX_FORMAT: &str = ".%Y%m%d_%H%M%S";

/// Decode a binary file according to a format specification
#[derive(Parser, Debug)]
#[command(name = "bindec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file containing the format specification
    #[arg(short, long, value_name = "FILE")]
    format: Option<PathBuf>,

    /// Structure to start from instead of the top-level dataset
    #[arg(long = "struct", visible_alias = "st", value_name = "NAME")]
    root: Option<String>,

    /// Starting offset in the input file
    #[arg(short = 's', long, default_value = "0")]
    input_offset: u64,

    /// Config file (default: bindec.cfg next to the executable)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip the config file; defaults stay standard and no typedefs are created
    #[arg(long, visible_alias = "sc", conflicts_with = "recreate_config")]
    skip_config: bool,

    /// Re-create the config file using standard values
    #[arg(long)]
    recreate_config: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Binary input file to process
    input_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config_doc = load_config(&config_path, cli.recreate_config, cli.skip_config)?;

    let format_doc = match &cli.format {
        Some(path) => config::load_document(path)
            .with_context(|| format!("Failed to load format file: {}", path.display()))?,
        None => {
            eprintln!("NOTE: no format definition file specified; only predefined structures may be used");
            Map::new()
        }
    };

    let options = SessionConfig::new().load_config_typedefs(!cli.skip_config);
    let session = Session::build(&config_doc, &format_doc, options)?;
    let root = session.root(cli.root.as_deref())?;

    let Some(input_path) = &cli.input_file else {
        eprintln!("NOTE: No input file, skipping data processing");
        return Ok(());
    };

    let stdout = io::stdout();
    let outcome = decode(&root, input_path, cli.input_offset, stdout.lock())?;
    info!("Finished: {:?}", outcome);
    Ok(())
}

/// `bindec.cfg` in the directory of the running executable
fn default_config_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the executable")?;
    let dir = exe
        .parent()
        .context("Executable path has no parent directory")?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Returns the config document to build the session from.
///
/// The standard config stands in when the file is skipped, missing or
/// has just been re-created.
fn load_config(path: &Path, recreate: bool, skip: bool) -> Result<Map<String, Value>> {
    if recreate {
        eprintln!("re-creating config file \"{}\"", path.display());
        if let Some(backup) = recreate_config(path)? {
            info!("Previous config saved as {}", backup.display());
        }
    } else if !skip {
        eprintln!("loading config file \"{}\"", path.display());
        if path.is_file() {
            return config::load_document(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()));
        }
        eprintln!(
            "warning: config file \"{}\" not found; continuing using defaults",
            path.display()
        );
    }
    Ok(config::standard_config()?)
}

/// Writes the standard config to `path`, renaming an existing file first
fn recreate_config(path: &Path) -> Result<Option<PathBuf>> {
    let backup = if path.is_file() {
        let stamp = chrono::Local::now().format(BACKUP_SUFFIX_FORMAT);
        let mut name = path.as_os_str().to_owned();
        name.push(stamp.to_string());
        let backup = PathBuf::from(name);
        fs::rename(path, &backup)
            .with_context(|| format!("Failed to back up config file: {}", path.display()))?;
        Some(backup)
    } else {
        None
    };

    fs::write(path, STANDARD_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(backup)
}

/// Decodes `input_path` from `offset` into `out`
fn decode(root: &FieldDef, input_path: &Path, offset: u64, out: impl Write) -> Result<RenderOutcome> {
    let file = fs::File::open(input_path)
        .with_context(|| format!("Failed to open input file: {}", input_path.display()))?;
    let mut input = BufReader::new(file);
    if offset > 0 {
        let len = input.seek(SeekFrom::End(0))?;
        if offset > len {
            bail!(
                "Input offset {:#x} is past the end of {} ({} bytes)",
                offset,
                input_path.display(),
                len
            );
        }
        input.seek(SeekFrom::Start(offset))?;
    }
    debug!("Decoding {} from offset {:#x}", input_path.display(), offset);

    let mut out = BufWriter::new(out);
    let outcome = render(root, input, &mut out)
        .with_context(|| format!("Failed to decode {}", input_path.display()))?;
    out.flush()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_session(format: &str) -> Session {
        let format = config::parse_document(format).unwrap();
        Session::build(
            &config::standard_config().unwrap(),
            &format,
            SessionConfig::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_recreate_config_backs_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        assert!(recreate_config(&path).unwrap().is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), STANDARD_CONFIG);

        fs::write(&path, "{}").unwrap();
        let backup = recreate_config(&path).unwrap().unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{}");
        assert_eq!(fs::read_to_string(&path).unwrap(), STANDARD_CONFIG);
        assert!(backup
            .to_string_lossy()
            .starts_with(&*path.to_string_lossy()));
    }

    #[test]
    fn test_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let missing = load_config(&path, false, false).unwrap();
        assert!(missing.contains_key(config::TYPEDEFS_KEY));

        fs::write(&path, "// custom\n{\"DEFAULTS\": {\"default_endian\": \"big\"}}").unwrap();
        let custom = load_config(&path, false, false).unwrap();
        assert!(!custom.contains_key(config::TYPEDEFS_KEY));

        let skipped = load_config(&path, false, true).unwrap();
        assert!(skipped.contains_key(config::TYPEDEFS_KEY));

        fs::write(&path, "{ broken").unwrap();
        assert!(load_config(&path, false, false).is_err());
    }

    #[test]
    fn test_decode_from_offset() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.bin");
        fs::write(&input, [0xff, 0x01, 0x02]).unwrap();

        let session = test_session(r#"{"a": "uint8", "b": "uint8"}"#);
        let root = session.root(None).unwrap();

        let mut out = Vec::new();
        let outcome = decode(&root, &input, 1, &mut out).unwrap();
        assert_eq!(outcome, RenderOutcome::Complete { bytes: 2 });
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n00000001  a: 0x01\n00000002  b: 0x02\nSUCCESS\n"
        );

        let mut out = Vec::new();
        let outcome = decode(&root, &input, 2, &mut out).unwrap();
        assert_eq!(outcome, RenderOutcome::Truncated { offset: 3 });

        assert!(decode(&root, &input, 4, Vec::new()).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
