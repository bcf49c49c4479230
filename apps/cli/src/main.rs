//! masterdoc CLI: assemble article documents into one master document.
//!
//! Orders articles by section, adds section banners and abstracts, puts a
//! table of contents in front, and writes a landscape `.docx`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
