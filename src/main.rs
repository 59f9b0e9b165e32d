use clap::{Parser, Subcommand};
use portia_archive::archive::Archive;
use portia_archive::checksum::{crc64, digest_hex};
use portia_archive::frame::FrameMode;
use portia_archive::patch::{patch_directory, PatchOptions, PatchOutcome, DEFAULT_BLOCK_KEY};
use portia_archive::summary::Summary;
use std::path::PathBuf;
use tracing::Level;

const SAVE_SUBDIR: &str = "AppData/LocalLow/Pathea Games/My Time at Portia";

#[derive(Parser)]
#[command(name = "portia-save", about = "Inspect and patch My Time at Portia save archives")]
struct Cli {
    /// Log decoding details
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove DLC requirements from every save in a directory
    Patch {
        /// Save directory (defaults to the game's save folder)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Verify only; do not write anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show header and block table
    Info {
        input: PathBuf,
    },
    /// Check every block checksum and decode the summary
    Verify {
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_BLOCK_KEY)]
        key: String,
    },
    /// Print the summary record as JSON
    Show {
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_BLOCK_KEY)]
        key: String,
        /// Tolerate frame length mismatches
        #[arg(long)]
        lenient: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    match cli.command {
        // ── Patch ────────────────────────────────────────────────────────────
        Commands::Patch { dir, dry_run } => {
            let dir = dir.unwrap_or_else(default_save_dir);
            let opts = PatchOptions { dry_run, ..PatchOptions::default() };
            println!("Save directory: {}", dir.display());

            let mut failed = 0usize;
            for (path, outcome) in patch_directory(&dir, &opts)? {
                let name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
                match outcome {
                    Ok(PatchOutcome::AlreadyClean) => println!("  {name:<24} no DLC requirements"),
                    Ok(PatchOutcome::Patched { removed }) => {
                        println!("  {name:<24} removed {removed:?}{}", if dry_run { " (dry run)" } else { "" })
                    }
                    Err(e) => {
                        failed += 1;
                        println!("  {name:<24} FAILED: {e}");
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} file(s) could not be patched").into());
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let ar = Archive::load(&input)?;
            let header = ar.header();

            println!("── Save archive ─────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Version        {}", header.version);
            println!("  Saved at       {}", header.timestamp);
            println!("  Framed         {}", header.is_framed());
            println!("  Blocks         {}", ar.len());
            println!("{:<32} {:>10}  Checksum", "Key", "Size");
            for (key, payload) in ar.blocks() {
                println!("{:<32} {:>10}  {}", key, payload.len(), digest_hex(crc64(payload)));
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input, key } => {
            // Loading already checks every block checksum.
            let ar = Archive::load(&input)?;
            let summary: Summary = ar.fetch(&key)?;
            let played = summary.played_time.to_duration();
            println!(
                "OK: {} block(s), {} is {:?} level {}, played {}h{:02}m",
                ar.len(),
                key,
                summary.player_name.as_deref().unwrap_or("<unnamed>"),
                summary.level,
                played.num_hours(),
                played.num_minutes() % 60
            );
        }

        // ── Show ─────────────────────────────────────────────────────────────
        Commands::Show { input, key, lenient } => {
            let ar = Archive::load(&input)?;
            let mode = if lenient { FrameMode::Lenient } else { FrameMode::Strict };
            let summary: Summary = ar.fetch_with(&key, mode)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn default_save_dir() -> PathBuf {
    let home = std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(SAVE_SUBDIR)
}
