//! Veles CLI - command-line tool for console game archive extraction.
//!
//! This is the main entry point for the Veles command-line application.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use veles::prelude::*;

/// Veles - console game archive extraction tool
#[derive(Parser)]
#[command(name = "veles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Container generation override.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GenerationArg {
    /// Detect from the first frame tag
    Auto,
    /// First generation (32-byte frames)
    V1,
    /// Second generation (16-byte frames)
    V2,
}

impl From<GenerationArg> for Option<Generation> {
    fn from(arg: GenerationArg) -> Self {
        match arg {
            GenerationArg::Auto => None,
            GenerationArg::V1 => Some(Generation::V1),
            GenerationArg::V2 => Some(Generation::V2),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract resources from a WAD archive
    Extract {
        /// Path to the WAD file
        #[arg(short, long, env = "INPUT_WAD")]
        wad: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        out: PathBuf,

        /// Container generation
        #[arg(short, long, value_enum, default_value_t = GenerationArg::Auto)]
        generation: GenerationArg,

        /// Print the resource tree before extracting
        #[arg(long)]
        print: bool,

        /// Also dump each handled node's raw payload
        #[arg(long)]
        dump: bool,
    },

    /// Print the resource tree of a WAD archive
    Print {
        /// Path to the WAD file
        #[arg(short, long, env = "INPUT_WAD")]
        wad: PathBuf,

        /// Container generation
        #[arg(short, long, value_enum, default_value_t = GenerationArg::Auto)]
        generation: GenerationArg,
    },

    /// Unpack a multi-volume pack store into files
    Unpack {
        /// Path to the table-of-contents file
        #[arg(short, long)]
        toc: PathBuf,

        /// Directory holding the part<N>.pak volumes (defaults to the
        /// TOC's directory)
        #[arg(short, long)]
        volumes: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            wad,
            out,
            generation,
            print,
            dump,
        } => cmd_extract(&wad, &out, generation, print, dump)?,
        Commands::Print { wad, generation } => cmd_print(&wad, generation)?,
        Commands::Unpack { toc, volumes, out } => cmd_unpack(&toc, volumes, &out)?,
    }

    Ok(())
}

fn cmd_extract(
    wad_path: &PathBuf,
    out: &PathBuf,
    generation: GenerationArg,
    print: bool,
    dump: bool,
) -> Result<()> {
    println!("Opening WAD archive: {}", wad_path.display());

    let data = fs::read(wad_path).context("Failed to read WAD file")?;

    let start = Instant::now();
    let mut archive = Wad::parse(&data, generation.into()).context("Failed to parse WAD")?;
    println!(
        "Parsed {} node(s) ({:?} generation) in {:?}",
        archive.node_count(),
        archive.generation(),
        start.elapsed()
    );

    if print {
        print!("{}", archive.format_tree());
    }

    let registry = veles::default_registry();
    let mut options = ExtractOptions::new(out);
    options.dump_raw = dump;

    let start = Instant::now();
    let summary = Driver::new(&registry, options).run(&mut archive);
    println!(
        "Extracted {} node(s) in {:?}",
        summary.extracted,
        start.elapsed()
    );

    for (path, err) in &summary.failures {
        eprintln!("Failed root '{path}': {err}");
    }
    if !summary.failures.is_empty() {
        anyhow::bail!("{} root(s) failed to extract", summary.failures.len());
    }

    Ok(())
}

fn cmd_print(wad_path: &PathBuf, generation: GenerationArg) -> Result<()> {
    let data = fs::read(wad_path).context("Failed to read WAD file")?;
    let archive = Wad::parse(&data, generation.into()).context("Failed to parse WAD")?;

    print!("{}", archive.format_tree());
    println!("\nTotal: {} node(s)", archive.node_count());

    Ok(())
}

fn cmd_unpack(toc_path: &PathBuf, volumes: Option<PathBuf>, out: &PathBuf) -> Result<()> {
    let toc_data = fs::read(toc_path).context("Failed to read TOC file")?;
    let toc = parse_toc(&toc_data).context("Failed to parse TOC")?;
    println!("TOC lists {} record(s)", toc.len());

    let volume_dir = volumes.unwrap_or_else(|| {
        toc_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let set = VolumeSet::new(&volume_dir);

    fs::create_dir_all(out)?;

    let pb = ProgressBar::new(toc.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    for entry in &toc {
        pb.set_message(entry.name.clone());
        let data = set
            .read(entry)
            .with_context(|| format!("Failed to read '{}'", entry.name))?;
        fs::write(out.join(&entry.name), data)?;
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Unpacked {} record(s) in {:?}", toc.len(), start.elapsed());

    Ok(())
}
