mod error;

use clap::{Parser, Subcommand};
use common::config::{loader, BuildMode, RunConfig, SortMode};
use dag::eval::AttrEval;
use error::CoreError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "schemasync")]
struct Cli {
    #[arg(long = "config-path", short = 'c', global = true, help = "path to a RunConfig TOML file")]
    config_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Diff two object trees and emit an ordered build plan.
    Diff(DiffArgs),
}

#[derive(clap::Args)]
struct DiffArgs {
    /// Path to the before-state object tree XML.
    #[arg(long)]
    before: PathBuf,
    /// Path to the after-state object tree XML.
    #[arg(long)]
    after: PathBuf,
    /// Path to the diff rule-set XML.
    #[arg(long)]
    rules: PathBuf,
    /// Where to write the plan XML; stdout if omitted.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Use the simple DFS sort instead of the locality-biased smart sort.
    #[arg(long)]
    simple_sort: bool,
    /// Never consult <context> declarations.
    #[arg(long)]
    ignore_contexts: bool,
    #[arg(long, value_enum)]
    build_mode: Option<CliBuildMode>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliBuildMode {
    BuildOnly,
    DropOnly,
    BuildAndDrop,
}

impl From<CliBuildMode> for BuildMode {
    fn from(value: CliBuildMode) -> Self {
        match value {
            CliBuildMode::BuildOnly => BuildMode::BuildOnly,
            CliBuildMode::DropOnly => BuildMode::DropOnly,
            CliBuildMode::BuildAndDrop => BuildMode::BuildAndDrop,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Cmd::Diff(args) => run_diff(cli.config_path.as_deref(), args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_diff(config_path: Option<&std::path::Path>, args: DiffArgs) -> Result<(), CoreError> {
    let mut config: RunConfig = loader::read_config(config_path)?;
    if args.simple_sort {
        config.sort_mode = SortMode::Simple;
    }
    if args.ignore_contexts {
        config.ignore_contexts = true;
    }
    if let Some(mode) = args.build_mode {
        config.build_mode = mode.into();
    }

    tracing::info!(before = %args.before.display(), after = %args.after.display(), "loading object trees");
    let before = catalog::xml::load_object_tree(&args.before)?;
    let after = catalog::xml::load_object_tree(&args.after)?;
    let rules = catalog::xml::load_rule_set(&args.rules)?;

    let items = dag::plan(&before, &after, &rules, &AttrEval, &config)?;
    tracing::info!(count = items.len(), "plan ready");

    let xml = executor::emit_plan(&items)?;

    match args.output {
        Some(path) => std::fs::write(&path, xml).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?,
        None => println!("{xml}"),
    }

    Ok(())
}
