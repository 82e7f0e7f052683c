use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use n64split_core::disasm::{Disassembler, WordDumpDisassembler};
use n64split_core::{ArtifactWriter, OutputLayout, ProcedureIndex, Rom, SectionKind, SplitConfig, Splitter};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// ROM image (.z64, .v64 or .n64)
    rom: PathBuf,

    /// YAML section map
    config: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "gen")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let args = Args::parse();

    let rom = Rom::load(&args.rom).with_context(|| format!("read ROM: {}", args.rom.display()))?;
    let config = SplitConfig::load(&args.config)?;
    let table = config.section_table(rom.len())?;
    log::info!(
        "{}: {} sections over 0x{:X} bytes",
        if config.name.is_empty() { &config.basename } else { &config.name },
        table.len(),
        rom.len()
    );

    let mut disassembler = WordDumpDisassembler;
    let code: Vec<_> = table
        .iter()
        .filter(|s| s.kind == SectionKind::Code)
        .map(|s| config.memory.rom_to_ram(s.start)..config.memory.rom_to_ram(s.end))
        .collect();
    let discovered = disassembler.discover_procedures(rom.as_slice(), &code, &config.memory);
    let procedures = ProcedureIndex::build(config.procedures.iter().cloned().chain(discovered));
    log::info!("{} procedures", procedures.len());

    let layout = OutputLayout::new(&args.output);
    let output = Splitter::new(&rom, &config, &table, &procedures, layout.clone())
        .with_disassembler(disassembler)
        .split()
        .context("split ROM")?;
    output
        .write(&ArtifactWriter::new(layout))
        .with_context(|| format!("write output to {}", args.output.display()))?;

    Ok(())
}
