// Command-line driver for fortrace. Stands in for the host editor:
// loads a pre-built symbol database, builds a call tree and exports it.

use anyhow::{bail, Result};
use clap::Parser;

use fortrace::api::dto::TreeDto;
use fortrace::application::NavigateUsecase;
use fortrace::domain::builder::{CallTreeBuilder, CancelToken};
use fortrace::domain::calltree::{BuildStatus, CalledByIndex};
use fortrace::infrastructure::{concurrency, DatabaseLoader, ProjectConfig};
use fortrace::ports::tree_exporter::{DotTreeExporter, TextTreeExporter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Symbol database shard(s), JSON as exported by the parser
    #[arg(short, long, required = false)]
    database: Vec<String>,

    /// Project config file (fortrace.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Name of the symbol to start from
    #[arg(short, long)]
    symbol: String,

    /// File of the symbol under the cursor
    #[arg(long, default_value = "")]
    file: String,

    /// Line of the symbol under the cursor
    #[arg(long, default_value_t = 0)]
    line: u32,

    /// Build the reverse tree (who calls this symbol)
    #[arg(long, default_value_t = false)]
    called_by: bool,

    /// Maximum recursion depth (overrides the config file)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output file path
    #[arg(short, long)]
    output: String,

    /// Output format (text, dot, json)
    #[arg(short = 'F', long, default_value = "text")]
    format: String,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    };

    let mut shards = config.databases.clone();
    shards.extend(cli.database.iter().cloned());
    if shards.is_empty() {
        bail!("Provide at least one --database <shard.json> or a config file listing databases");
    }

    let mut opts = config.build_options();
    if let Some(depth) = cli.max_depth {
        opts.max_depth = depth;
    }

    // Best effort: the host may already have installed a pool.
    let _ = concurrency::init_thread_pool();

    let db = DatabaseLoader::load(&shards)?;
    let builder = CallTreeBuilder::new(&db, opts);
    let cancel = CancelToken::new();

    let status = match cli.format.as_str() {
        "text" => NavigateUsecase {
            exporter: &TextTreeExporter,
        }
        .run(
            &builder,
            &cli.symbol,
            &cli.file,
            cli.line,
            cli.called_by,
            &cancel,
            &cli.output,
        )?,
        "dot" => NavigateUsecase {
            exporter: &DotTreeExporter,
        }
        .run(
            &builder,
            &cli.symbol,
            &cli.file,
            cli.line,
            cli.called_by,
            &cancel,
            &cli.output,
        )?,
        "json" => {
            let outcome = if cli.called_by {
                let index = CalledByIndex::build(&db);
                builder.build_called_by(&cli.symbol, &cli.file, cli.line, &index, &cancel, None)
            } else {
                builder.build(&cli.symbol, &cli.file, cli.line, &cancel, None)
            };
            let dto = TreeDto::from_outcome(&outcome, &db);
            std::fs::write(&cli.output, serde_json::to_string_pretty(&dto)?)?;
            outcome.status
        }
        other => bail!("Unknown output format: {}", other),
    };

    match status {
        BuildStatus::Completed => println!(
            "Call tree for '{}' written to {} (format: {})",
            cli.symbol, cli.output, cli.format
        ),
        BuildStatus::Cancelled => println!("Build cancelled; partial tree written to {}", cli.output),
    }
    Ok(())
}
