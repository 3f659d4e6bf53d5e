//! pdfstm - Encode and decode byte streams through PDF stream filter chains
//!
//! Filters are named in PDF order, the order they appear in a stream's
//! `/Filter` array. Decoding applies them in that order; encoding applies
//! the matching encoders in reverse, so the output decodes with the same
//! `--filter` list.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pdfstm_core::filter::{DecodeParms, ParmValue};
use pdfstm_core::{
    transform, Backend, Direction, FileBackend, FilterKind, FilterSpec, MemoryBackend, Stream,
    StreamConfig, StreamMode,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Encode and decode byte streams through PDF stream filter chains
#[derive(Parser, Debug)]
#[command(name = "pdfstm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Filter name in PDF order (FlateDecode, A85, Crypt, ...); repeatable
    #[arg(short, long = "filter", value_name = "NAME", required = true)]
    filters: Vec<String>,

    /// Encode instead of decode
    #[arg(short, long)]
    encode: bool,

    /// Filter parameter as KEY=VALUE, e.g. Predictor=12 or CFM=/AESV2
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, ParmValue)>,

    /// Crypt filter key as hex digits
    #[arg(long, value_name = "HEX")]
    key: Option<String>,

    /// AESV2 initialization vector as hex digits (random when encoding without one)
    #[arg(long, value_name = "HEX")]
    iv: Option<String>,

    /// Input file (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite the output file if it exists
    #[arg(long)]
    force: bool,

    /// Print the resolved filter chain and exit
    #[arg(long)]
    show_chain: bool,

    /// Capacity of the backend cache and of each filter's output buffer
    #[arg(long, default_value = "4096", value_parser = clap::value_parser!(usize))]
    buffer_size: usize,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn direction(&self) -> Direction {
        if self.encode {
            Direction::Encode
        } else {
            Direction::Decode
        }
    }

    fn decode_parms(&self) -> Result<DecodeParms> {
        let mut parms = DecodeParms::new();
        for (key, value) in &self.params {
            parms.insert(key.clone(), value.clone());
        }
        if let Some(key) = &self.key {
            parms.insert("Key", ParmValue::Bytes(parse_hex(key).context("Invalid --key")?));
        }
        if let Some(iv) = &self.iv {
            parms.insert("IV", ParmValue::Bytes(parse_hex(iv).context("Invalid --iv")?));
        }
        Ok(parms)
    }

    /// Resolves the filter names into specs in data-flow order
    fn chain(&self) -> Result<Vec<FilterSpec>> {
        let parms = self.decode_parms()?;
        let direction = self.direction();

        let mut names: Vec<&str> = self.filters.iter().map(String::as_str).collect();
        if direction == Direction::Encode {
            names.reverse();
        }

        let mut chain = Vec::new();
        for name in names {
            let specs = FilterKind::specs_for_name(name, direction, &parms)
                .with_context(|| format!("Cannot configure filter {}", name))?;
            chain.extend(specs);
        }
        Ok(chain)
    }

    fn config(&self) -> StreamConfig {
        StreamConfig::new()
            .cache_size(self.buffer_size)
            .buffer_size(self.buffer_size)
    }
}

/// Parses a `KEY=VALUE` pair
///
/// Values are integers, `true`/`false`, `<hex>` byte strings, or names with
/// an optional leading slash.
fn parse_param(arg: &str) -> Result<(String, ParmValue), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", arg));
    }

    let value = if let Ok(n) = value.parse::<i64>() {
        ParmValue::Int(n)
    } else if let Ok(b) = value.parse::<bool>() {
        ParmValue::Bool(b)
    } else if let Some(hex) = value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) {
        ParmValue::Bytes(parse_hex(hex).map_err(|e| format!("{:#}", e))?)
    } else {
        ParmValue::Name(value.trim_start_matches('/').to_string())
    };
    Ok((key.to_string(), value))
}

/// Decodes hex digits with the library's own ASCIIHex filter
fn parse_hex(digits: &str) -> Result<Vec<u8>> {
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits in '{}'", digits);
    }
    transform(&FilterSpec::AsciiHex(Direction::Decode), digits.as_bytes())
        .with_context(|| format!("'{}' is not hex", digits))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
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

    let chain = cli.chain()?;
    if cli.show_chain {
        for spec in &chain {
            println!("{}", spec.name());
        }
        return Ok(());
    }
    debug!(
        "Resolved chain: {}",
        chain.iter().map(FilterSpec::name).collect::<Vec<_>>().join(" -> ")
    );

    let (bytes_in, bytes_out) = if cli.encode {
        encode(&cli, chain)?
    } else {
        decode(&cli, chain)?
    };
    info!("Summary: {} bytes in, {} bytes out", bytes_in, bytes_out);

    Ok(())
}

/// Pulls the input through a read stream and copies the result to the output
fn decode(cli: &Cli, chain: Vec<FilterSpec>) -> Result<(u64, u64)> {
    let (backend, bytes_in): (Backend, u64) = match &cli.input {
        Some(path) => {
            let len = fs::metadata(path)
                .with_context(|| format!("Failed to stat input file: {}", path.display()))?
                .len();
            let file = FileBackend::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            (file.into(), len)
        }
        None => {
            let data = read_stdin()?;
            let len = data.len() as u64;
            (MemoryBackend::from_vec(data).into(), len)
        }
    };

    let mut stream = Stream::open_with_config(backend, StreamMode::Read, chain, cli.config())
        .context("Failed to open decode stream")?;
    let mut output = open_output(cli.output.as_deref(), cli.force)?;
    let copied = copy_decoded(&mut stream, &mut output);
    drop(output);
    if copied.is_err() {
        if let Some(path) = &cli.output {
            discard_output(path);
        }
    }
    let bytes_out = copied?;
    stream.close().context("Failed to close decode stream")?;

    Ok((bytes_in, bytes_out))
}

fn copy_decoded(stream: &mut Stream, output: &mut dyn Write) -> Result<u64> {
    let copied = io::copy(stream, output).context("Decoding failed")?;
    output.flush().context("Failed to flush output")?;
    Ok(copied)
}

/// Removes an output file left incomplete by a failed run
fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output: {}", path.display()),
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

/// Storage for the encoded output: the output file, or memory flushed to stdout
fn encode_target(path: Option<&Path>, force: bool) -> Result<Backend> {
    match path {
        Some(path) => {
            refuse_overwrite(path, force)?;
            let file = FileBackend::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Ok(file.into())
        }
        None => Ok(MemoryBackend::growable().into()),
    }
}

/// Encodes into the output, removing the output file if encoding fails
fn encode(cli: &Cli, chain: Vec<FilterSpec>) -> Result<(u64, u64)> {
    let backend = encode_target(cli.output.as_deref(), cli.force)?;
    let encoded = encode_into(cli, backend, chain);
    if encoded.is_err() {
        if let Some(path) = &cli.output {
            discard_output(path);
        }
    }
    encoded
}

/// Copies the input into a write stream over `backend`
fn encode_into(cli: &Cli, backend: Backend, chain: Vec<FilterSpec>) -> Result<(u64, u64)> {
    let mut stream = Stream::open_with_config(backend, StreamMode::Write, chain, cli.config())
        .context("Failed to open encode stream")?;

    let bytes_in = match &cli.input {
        Some(path) => {
            let mut file = fs::File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            io::copy(&mut file, &mut stream).context("Encoding failed")?
        }
        None => io::copy(&mut io::stdin().lock(), &mut stream).context("Encoding failed")?,
    };

    let bytes_out = match &cli.output {
        Some(path) => {
            stream.close().context("Failed to close encode stream")?;
            fs::metadata(path)
                .with_context(|| format!("Failed to stat output file: {}", path.display()))?
                .len()
        }
        None => {
            let data = stream
                .finish()
                .context("Failed to finish encode stream")?
                .into_memory()
                .context("Encode stream lost its memory backend")?
                .into_vec();
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data).context("Failed to write stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
            data.len() as u64
        }
    };

    Ok((bytes_in, bytes_out))
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut data = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut data)
        .context("Failed to read stdin")?;
    Ok(data)
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

fn open_output(path: Option<&Path>, force: bool) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            refuse_overwrite(path, force)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            Ok(Box::new(io::BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pdfstm").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_param_values() {
        assert_eq!(parse_param("Predictor=12").unwrap(), ("Predictor".into(), ParmValue::Int(12)));
        assert_eq!(parse_param("/CFM=/AESV2").unwrap(), ("CFM".into(), ParmValue::Name("AESV2".into())));
        assert_eq!(parse_param("EarlyChange=false").unwrap().1, ParmValue::Bool(false));
        assert_eq!(parse_param("Key=<0aFF>").unwrap().1, ParmValue::Bytes(vec![0x0a, 0xff]));
        assert!(parse_param("Predictor").is_err());
        assert!(parse_param("=3").is_err());
        assert!(parse_param("Key=<0g>").is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_encode_chain_is_reversed() {
        let cli = parse(&["-e", "-f", "A85", "-f", "FlateDecode", "-p", "Predictor=2", "-p", "Columns=3"]);
        let names: Vec<_> = cli.chain().unwrap().iter().map(FilterSpec::name).collect();
        assert_eq!(names, ["PredictorEncode", "FlateEncode", "ASCII85Encode"]);

        let cli = parse(&["-f", "A85", "-f", "FlateDecode", "-p", "Predictor=2", "-p", "Columns=3"]);
        let names: Vec<_> = cli.chain().unwrap().iter().map(FilterSpec::name).collect();
        assert_eq!(names, ["ASCII85Decode", "FlateDecode", "PredictorDecode"]);
    }

    #[test]
    fn test_crypt_chain_takes_key() {
        let cli = parse(&["-f", "Crypt", "-p", "CFM=/AESV2", "--key", "000102030405060708090a0b0c0d0e0f"]);
        let chain = cli.chain().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name(), "AESV2Decrypt");
    }

    #[test]
    fn test_unknown_filter() {
        assert!(parse(&["-f", "JBIG2Decode"]).chain().is_err());
    }

    #[test]
    fn test_failed_decode_removes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.hex");
        let output = dir.path().join("out.bin");
        fs::write(&input, b"41 4z>").unwrap();

        let cli = parse(&["-f", "AHx", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
        assert!(decode(&cli, cli.chain().unwrap()).is_err());
        assert!(!output.exists());

        fs::write(&input, b"41 42>").unwrap();
        assert_eq!(decode(&cli, cli.chain().unwrap()).unwrap(), (6, 2));
        assert_eq!(fs::read(&output).unwrap(), b"AB");
    }

    #[test]
    fn test_failed_encode_removes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("missing.bin");
        let output = dir.path().join("out.hex");

        let cli = parse(&["-e", "-f", "AHx", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
        assert!(encode(&cli, cli.chain().unwrap()).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_refuse_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        assert!(refuse_overwrite(&path, false).is_ok());
        fs::write(&path, b"x").unwrap();
        assert!(refuse_overwrite(&path, false).is_err());
        assert!(refuse_overwrite(&path, true).is_ok());
    }
}
