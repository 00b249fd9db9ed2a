use clap::{Parser, Subcommand};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use ztream::header::{EndOfCentralDirectory, EOCD_SIZE};
use ztream::{blake3_name, scan_file, Blake3Verifier, Options, Stream};

#[derive(Parser)]
#[command(name = "ztream", about = "Append-only, crash-tolerant ZIP containers")]
struct Cli {
    /// JSON file with stream options (file_size, sample_compress_size, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty, preallocated container
    Create {
        path: PathBuf,
        /// Container size in bytes (2^18 ..= 2^30)
        #[arg(short, long)]
        size: Option<u32>,
        /// Deflate level 0-9
        #[arg(short, long)]
        level: Option<u32>,
        /// Bytes trial-compressed per entry, 0 disables compression
        #[arg(long)]
        sample: Option<usize>,
        /// Compress only if the sample shrinks below this ratio
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Append files and sync them
    Put {
        path: PathBuf,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Name each entry by the BLAKE3 hex digest of its content
        #[arg(long)]
        content_addressed: bool,
    },
    /// List committed entries
    List {
        path: PathBuf,
    },
    /// Write one entry to a file or stdout
    Get {
        path: PathBuf,
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Securely overwrite an entry and drop it from the directory
    Wipe {
        path: PathBuf,
        name: String,
    },
    /// Walk the local headers without trusting the directory
    Scan {
        path: PathBuf,
        /// Decompress every entry and check its name is its BLAKE3 digest
        #[arg(long)]
        verify_blake3: bool,
    },
    /// Show container layout and occupancy
    Info {
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = load_options(cli.config.as_deref())?;

    match cli.command {

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { path, size, level, sample, threshold } => {
            let opts = Options {
                file_size:             size.or(base.file_size),
                compression_level:     level.or(base.compression_level),
                sample_compress_size:  sample.or(base.sample_compress_size),
                compression_threshold: threshold.or(base.compression_threshold),
                verifier:              None,
            };
            let stream = Stream::create(&path, opts)?;
            let size = stream.file_size();
            stream.close()?;
            println!("Created: {} ({} B)", path.display(), size);
        }

        // ── Put ──────────────────────────────────────────────────────────────
        Commands::Put { path, input, content_addressed } => {
            let mut stream = Stream::open(&path, base)?;
            for file in &input {
                let data = std::fs::read(file)?;
                let name = if content_addressed {
                    blake3_name(&data)
                } else {
                    file.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| format!("{} has no file name", file.display()))?
                };
                let entry = stream.append(&name, &data)?;
                println!("  put  {}  {} → {} B", name, entry.uncompressed_size, entry.compressed_size);
            }
            stream.sync()?;
            stream.close()?;
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { path } => {
            let mut stream = Stream::open(&path, base)?;
            println!("Stream: {}", path.display());
            println!("{:<40} {:>12} {:>12} {:>10}  Method", "Name", "Size", "Stored", "Offset");
            for entry in stream.contents()? {
                println!("{:<40} {:>12} {:>12} {:>10}  {}",
                    entry.name, entry.uncompressed_size, entry.compressed_size,
                    entry.offset, entry.method().name());
            }
            stream.close()?;
        }

        // ── Get ──────────────────────────────────────────────────────────────
        Commands::Get { path, name, output } => {
            let mut stream = Stream::open(&path, base)?;
            let entry = stream
                .find(&name)?
                .ok_or_else(|| ztream::ZtreamError::NotFound(name.clone()))?;
            let data = stream.read_to_vec(&entry)?;
            match output {
                Some(out) => {
                    std::fs::write(&out, &data)?;
                    println!("Wrote {} B to {}", data.len(), out.display());
                }
                None => std::io::stdout().lock().write_all(&data)?,
            }
            stream.close()?;
        }

        // ── Wipe ─────────────────────────────────────────────────────────────
        Commands::Wipe { path, name } => {
            let mut stream = Stream::open(&path, base)?;
            stream.wipe(&name)?;
            stream.close()?;
            println!("Wiped: {}", name);
        }

        // ── Scan ─────────────────────────────────────────────────────────────
        Commands::Scan { path, verify_blake3 } => {
            let mut verifier = Blake3Verifier::new();
            let report = if verify_blake3 {
                scan_file(&path, Some(&mut verifier))?
            } else {
                scan_file(&path, None)?
            };
            println!("{}", report.summary());
            for stored in &report.entries {
                println!("  {:>10}  crc={:08x}  {:>10} → {:>10}  {}",
                    stored.entry.offset, stored.crc32, stored.entry.uncompressed_size,
                    stored.entry.compressed_size, stored.entry.name);
            }
            for region in &report.wiped {
                println!("  {:>10}  wiped  {} B", region.offset, region.len);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { path } => {
            let mut stream = Stream::open(&path, base)?;
            let stats = stream.stats()?;
            let eocd = read_eocd(&path)?;

            println!("── ztream ───────────────────────────────────────────────");
            println!("  Path           {}", path.display());
            println!("  File size      {} B", stats.file_size);
            println!("  Entries        {} ({} deflated)", stats.committed, stats.deflated);
            println!("  Stored         {} B", stats.stored_bytes);
            println!("  Uncompressed   {} B", stats.uncompressed_bytes);
            println!("  Free           {} B", stats.free_bytes);
            match eocd {
                Some(eocd) => {
                    println!("  Directory      {} entries, {} B at {}",
                        eocd.entries, eocd.directory_size, eocd.directory_offset);
                }
                None => println!("  Directory      missing (not closed cleanly)"),
            }
            println!("  Settings       {}", serde_json::to_string(&stream.config().settings())?);
            stream.close()?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn load_options(config: Option<&Path>) -> Result<Options, Box<dyn std::error::Error>> {
    Ok(match config {
        Some(path) => Options::from_json_file(path)?,
        None       => Options::default(),
    })
}

/// The EOCD record at the tail of the file, if one is there.
fn read_eocd(path: &Path) -> Result<Option<EndOfCentralDirectory>, Box<dyn std::error::Error>> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len < EOCD_SIZE as u64 {
        return Ok(None);
    }
    let offset = file.seek(SeekFrom::End(-(EOCD_SIZE as i64)))?;
    Ok(EndOfCentralDirectory::read(&mut file, offset).ok())
}
