use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, error::ErrorKind};
use rkboot_core::{BootSession, Mode, NusbBackend, SessionConfig};
use tracing::{error, info};

mod console;

use console::ConsoleObserver;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rockchip maskrom USB boot tool (Pure Rust)", long_about = None)]
struct Args {
    /// List the Rockchip devices in maskrom mode
    #[arg(short, long)]
    list: bool,

    /// Boot the N-th maskrom device
    #[arg(short = 'n', long = "num", value_name = "NUM", value_parser = parse_usize)]
    index: Option<usize>,

    /// Boot the first maskrom device with this product id (ex: 0x350a)
    #[arg(short = 'p', long = "pid", value_name = "PID", value_parser = parse_u16)]
    product_id: Option<u16>,

    /// Stage-1 image (tpl.bin)
    #[arg(requires = "stage2")]
    stage1: Option<PathBuf>,

    /// Stage-2 image (spl.bin)
    stage2: Option<PathBuf>,

    /// Load session settings from a TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Integer in C `strtoul(.., 0)` notation: `0x` hex, leading `0` octal.
fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_number(s)?;
    u16::try_from(value).map_err(|_| format!("'{}' does not fit in 16 bits", s))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    let value = parse_number(s)?;
    usize::try_from(value).map_err(|_| format!("'{}' is out of range", s))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }

    let mode = match Mode::resolve(args.list, args.index, args.product_id) {
        Ok(mode) => mode,
        Err(e) => Args::command().error(ErrorKind::ArgumentConflict, e).exit(),
    };
    if mode == Mode::List && args.stage1.is_some() {
        Args::command()
            .error(ErrorKind::TooManyValues, "list mode takes no image arguments")
            .exit();
    }

    match run(mode, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Failed.");
            ExitCode::FAILURE
        }
    }
}

fn run(mode: Mode, args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SessionConfig::default(),
    };

    // A selection given on the command line replaces the one from the file.
    if args.index.is_some() || args.product_id.is_some() {
        config.index = args.index;
        config.product_id = args.product_id;
    }
    if let (Some(stage1), Some(stage2)) = (args.stage1, args.stage2) {
        config.stage1_path = Some(stage1);
        config.stage2_path = Some(stage2);
    }

    let observer = Arc::new(ConsoleObserver::new());
    let mut session = BootSession::with_backend(NusbBackend::new(), config, observer);

    match mode {
        Mode::List => {
            for device in session.list()? {
                println!("{}", device);
            }
        }
        Mode::Boot(_) => {
            info!("Starting rkusbboot (nusb backend)...");
            session.run()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_bases() {
        assert_eq!(parse_number("0x350a"), Ok(0x350A));
        assert_eq!(parse_number("0X110A"), Ok(0x110A));
        assert_eq!(parse_number("010"), Ok(8));
        assert_eq!(parse_number("0"), Ok(0));
        assert_eq!(parse_number("12"), Ok(12));
        assert!(parse_number("0xzz").is_err());
    }

    #[test]
    fn test_pid_must_fit_u16() {
        assert_eq!(parse_u16("0x350a"), Ok(0x350A));
        assert!(parse_u16("0x10000").is_err());
    }

    #[test]
    fn test_args_shape() {
        let args = Args::try_parse_from(["rkusbboot", "-p", "0x350a", "tpl.bin", "spl.bin"]).unwrap();
        assert_eq!(args.product_id, Some(0x350A));
        assert_eq!(args.stage1, Some(PathBuf::from("tpl.bin")));
        assert_eq!(args.stage2, Some(PathBuf::from("spl.bin")));

        let args = Args::try_parse_from(["rkusbboot", "-l"]).unwrap();
        assert!(args.list);
        assert!(args.stage1.is_none());

        assert!(Args::try_parse_from(["rkusbboot", "a", "b", "c"]).is_err());
        assert!(Args::try_parse_from(["rkusbboot", "tpl.bin"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        Args::command().debug_assert();
    }
}
