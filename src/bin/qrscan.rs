use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use log::{Level, LevelFilter, Log, Metadata, Record};

use qrscan::{decode_luminance, tools, DecodeError};

/// Decode a QR code from an image file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Image file (PNG or JPEG) containing one QR code.
    image: std::path::PathBuf,

    /// Print decoding metadata alongside the payload.
    #[arg(long)]
    meta: bool,

    /// Log pipeline stages to stderr (-v debug, -vv everything).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        let _ = writeln!(
            std::io::stderr(),
            "[{:>5}] {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    let image = match tools::load_luminance(&args.image) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    match decode_luminance(&image) {
        Ok(decoded) => {
            println!("{}", decoded.text);
            if args.meta {
                eprintln!(
                    "version {} | ec level {:?} | {} byte segment(s){}{}",
                    decoded.version.number(),
                    decoded.ec_level,
                    decoded.byte_segments.len(),
                    if decoded.mirrored { " | mirrored" } else { "" },
                    match decoded.structured_append {
                        Some(sa) => format!(" | structured append {}/{:#04x}", sa.sequence, sa.parity),
                        None => String::new(),
                    }
                );
            }
            ExitCode::SUCCESS
        }
        Err(DecodeError::NotFound) => {
            eprintln!("no QR code found in {}", args.image.display());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
