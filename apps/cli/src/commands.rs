//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use masterdoc_core::catalog::plan_catalog;
use masterdoc_core::inputs::{InputList, scan_directory};
use masterdoc_core::orientation;
use masterdoc_core::pipeline::{self, BuildConfig, BuildResult, ProgressReporter};
use masterdoc_shared::{
    AppConfig, StyleConflict, config_file_path, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// masterdoc: assemble article documents into one master document.
#[derive(Parser)]
#[command(
    name = "masterdoc",
    version,
    about = "Assemble article documents and their summaries into one landscape master document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.masterdoc/masterdoc.toml.
    #[arg(long, global = true, env = "MASTERDOC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the document and summary paths come from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = true)]
pub(crate) struct InputArgs {
    /// Article documents (`.docx`).
    #[arg(long, num_args = 1.., conflicts_with_all = ["input_list", "from_dir"], requires = "summaries")]
    pub docs: Vec<PathBuf>,

    /// Summary text files, one per document.
    #[arg(long, num_args = 1.., conflicts_with_all = ["input_list", "from_dir"], requires = "docs")]
    pub summaries: Vec<PathBuf>,

    /// JSON file with `documents` and `summaries` arrays.
    #[arg(long, conflicts_with = "from_dir")]
    pub input_list: Option<PathBuf>,

    /// Scan a directory recursively for documents and summaries.
    #[arg(long)]
    pub from_dir: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the master document.
    Build {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output file (defaults to `output.file_name` from config).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write a JSON run report here.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Directory relative banner paths resolve against
        /// (defaults to the config file's directory).
        #[arg(long)]
        banner_dir: Option<PathBuf>,

        /// Style collision policy, overriding config.
        #[arg(long, value_parser = parse_style_conflict)]
        style_conflict: Option<StyleConflict>,

        /// Keep the page orientation of the first document.
        #[arg(long)]
        no_landscape: bool,
    },

    /// Show the catalog order without building anything.
    Catalog {
        #[command(flatten)]
        inputs: InputArgs,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Force an existing `.docx` file to landscape pages, in place.
    Landscape {
        /// Document to fix up.
        path: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_style_conflict(value: &str) -> std::result::Result<StyleConflict, String> {
    match value {
        "keep-first" => Ok(StyleConflict::KeepFirst),
        "last-wins" => Ok(StyleConflict::LastWins),
        other => Err(format!(
            "unknown style conflict policy '{other}': expected 'keep-first' or 'last-wins'"
        )),
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "masterdoc=info",
        1 => "masterdoc=debug",
        _ => "masterdoc=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Build {
            inputs,
            output,
            report,
            banner_dir,
            style_conflict,
            no_landscape,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(policy) = style_conflict {
                config.output.style_conflict = policy;
            }
            if no_landscape {
                config.output.landscape = false;
            }
            let banner_dir = match banner_dir {
                Some(dir) => dir,
                None => default_banner_dir(config_path.as_deref())?,
            };
            cmd_build(config, &inputs, output, report.as_deref(), banner_dir)
        }
        Command::Catalog { inputs, json } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_catalog(&config, &inputs, json)
        }
        Command::Landscape { path } => cmd_landscape(&path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// The directory of the config file in use, or the working directory when
/// running on defaults.
fn default_banner_dir(config_path: Option<&Path>) -> Result<PathBuf> {
    let file = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    match file.parent() {
        Some(dir) if file.exists() && !dir.as_os_str().is_empty() => Ok(dir.to_path_buf()),
        _ => std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}")),
    }
}

fn resolve_inputs(args: &InputArgs, config: &AppConfig) -> Result<InputList> {
    let list = if let Some(dir) = &args.from_dir {
        scan_directory(dir, &config.paths)?
    } else if let Some(path) = &args.input_list {
        InputList::load(path)?
    } else {
        InputList {
            documents: args.docs.clone(),
            summaries: args.summaries.clone(),
        }
    };

    if list.documents.is_empty() {
        return Err(eyre!("no article documents were given"));
    }
    Ok(list)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(
    config: AppConfig,
    inputs: &InputArgs,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
    banner_dir: PathBuf,
) -> Result<()> {
    let list = resolve_inputs(inputs, &config)?;
    let output_path = output.unwrap_or_else(|| PathBuf::from(&config.output.file_name));

    info!(
        documents = list.documents.len(),
        output = %output_path.display(),
        "building master document"
    );

    let build_config = BuildConfig {
        documents: list.documents,
        summaries: list.summaries,
        output_path,
        banner_dir,
        config,
    };

    let reporter = CliProgress::new();
    let result = pipeline::build_master(&build_config, &reporter);
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    if let Some(path) = report_path {
        pipeline::write_report(path, &result.report)?;
    }

    let report = &result.report;
    println!();
    println!("  Master document written.");
    println!("  Path:     {}", report.output_path.display());
    println!("  Articles: {}", report.entries.len());
    println!("  Sections: {}", report.section_count);
    println!("  SHA-256:  {}", report.sha256);
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    if !report.warnings.is_empty() {
        println!("  Warnings:");
        for warning in &report.warnings {
            println!("    - {warning}");
        }
    }
    if let Some(path) = report_path {
        println!("  Report:   {}", path.display());
    }
    println!();

    Ok(())
}

fn cmd_catalog(config: &AppConfig, inputs: &InputArgs, json: bool) -> Result<()> {
    let list = resolve_inputs(inputs, config)?;
    let plan = plan_catalog(&list.documents, &list.summaries, config)?;

    if json {
        let entries: Vec<_> = plan
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.meta.name,
                    "section": e.meta.section,
                    "month": e.meta.month,
                    "section_start": e.is_section_start,
                    "recognized": e.recognized,
                    "document": e.document_path,
                    "summary": e.summary_path,
                })
            })
            .collect();
        let value = serde_json::json!({
            "entries": entries,
            "warnings": plan.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (i, entry) in plan.entries.iter().enumerate() {
        if entry.is_section_start {
            println!("{}", entry.meta.section);
        }
        println!("  {:>3}. {}", i + 1, entry.meta.name);
    }
    for warning in &plan.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn cmd_landscape(path: &Path) -> Result<()> {
    let report = orientation::fixup_file(path)?;
    if report.changed() {
        println!(
            "{}: {} section(s), {} rotated, {} page size(s) inserted",
            path.display(),
            report.sections,
            report.rotated,
            report.inserted
        );
    } else {
        println!("{}: already landscape", path.display());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn article_decorated(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Decorating [{current}/{total}] {name}"));
    }

    fn document_appended(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Composing [{current}/{total}]"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}
