// Command-line entry point for Callweave.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use callweave::application::enumerator::{DefinitionEnumerator, DefinitionQuery};
use callweave::application::source_report::source_report;
use callweave::application::CombineUsecase;
use callweave::config::Config;
use callweave::domain::bit_id;
use callweave::domain::combine::COMBINED_TITLE;
use callweave::domain::definition::{Definition, DefinitionId};
use callweave::domain::metadata::Metadata;
use callweave::domain::module_dependencies::module_dependencies;
use callweave::domain::store::{DefinitionStore, MemoryDefinitionStore};
use callweave::infrastructure::concurrency;
use callweave::infrastructure::definition_loader::DefinitionLoader;
use callweave::ports::dot_exporter::DotExporter;
use callweave::ports::json_exporter::JsonExporter;
use callweave::ports::GraphExporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./callweave.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge stored definitions into one graph
    Combine(CombineArgs),

    /// Encode or decode definition id sets
    BitId {
        #[command(subcommand)]
        command: BitIdCommand,
    },

    /// List stored definitions, grouped by definition group
    Definitions(ListArgs),

    /// Show where a source appears and who calls it
    Source {
        name: String,

        #[arg(short, long)]
        definitions: Option<PathBuf>,

        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Summarize calls between modules
    Modules {
        #[arg(short, long)]
        definitions: Option<PathBuf>,

        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Bit id of the definitions to summarize (all when omitted)
        #[arg(long)]
        ids: Option<String>,
    },

    /// Print the alias map
    Aliases {
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Edit aliases
    Alias {
        #[command(subcommand)]
        command: AliasCommand,
    },
}

#[derive(Parser, Debug)]
struct CombineArgs {
    /// Directory of `.json` / `.bin` definition records
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Metadata file with memos, modules and aliases
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Bit id of the definitions to combine (all when omitted)
    #[arg(long)]
    ids: Option<String>,

    #[arg(long)]
    group_by_module: bool,

    #[arg(long)]
    only_module: bool,

    /// Keep only sources in these modules
    #[arg(long = "module")]
    modules: Vec<String>,

    /// Keep only edges touching these modules
    #[arg(long = "focus-module")]
    focus_modules: Vec<String>,

    #[arg(long)]
    remove_internal_sources: bool,

    #[arg(long)]
    compound: bool,

    #[arg(long)]
    concentrate: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Dot)]
    format: OutputFormat,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Parser, Debug)]
struct ListArgs {
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Substring of the title
    #[arg(long, default_value = "")]
    title: String,

    /// Substring of any source name
    #[arg(long, default_value = "")]
    source: String,

    /// Substring of the definition group
    #[arg(long, default_value = "")]
    group: String,

    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long, default_value_t = 50)]
    per: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Dot,
    Json,
}

#[derive(Subcommand, Debug)]
enum BitIdCommand {
    Encode { ids: Vec<DefinitionId> },
    Decode { bit_id: String },
}

#[derive(Subcommand, Debug)]
enum AliasCommand {
    /// Replace the members of an alias; no sources removes it
    Set {
        #[arg(long)]
        metadata: Option<PathBuf>,
        alias_name: String,
        source_names: Vec<String>,
    },
    /// Move the members of an alias under a new name
    Rename {
        #[arg(long)]
        metadata: Option<PathBuf>,
        old_alias_name: String,
        new_alias_name: String,
        source_names: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Combine(args) => run_combine(&config, args),
        Command::BitId { command } => run_bit_id(command),
        Command::Definitions(args) => run_definitions(&config, args),
        Command::Source {
            name,
            definitions,
            metadata,
        } => run_source(&config, &name, definitions, metadata),
        Command::Modules {
            definitions,
            metadata,
            ids,
        } => run_modules(&config, definitions, metadata, ids),
        Command::Aliases { metadata } => {
            let metadata = Metadata::load(&metadata_path(&config, metadata));
            for (alias_name, source_names) in metadata.source_alias().to_map() {
                println!("{}: {}", alias_name, source_names.join(", "));
            }
            Ok(())
        }
        Command::Alias { command } => run_alias(&config, command),
    }
}

fn metadata_path(config: &Config, path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| config.storage.metadata_path.clone())
}

fn load_store(config: &Config, dir: Option<PathBuf>) -> Result<MemoryDefinitionStore> {
    if let Err(e) = concurrency::init_thread_pool(config.workers.worker_ratio) {
        tracing::debug!(error = %e, "global thread pool already initialized");
    }

    let dir = dir.unwrap_or_else(|| config.storage.definitions_dir.clone());
    let store = MemoryDefinitionStore::new();
    DefinitionLoader::load_dir(&dir, &store)?;
    Ok(store)
}

fn run_combine(config: &Config, args: CombineArgs) -> Result<()> {
    let store = load_store(config, args.definitions)?;
    let metadata = Metadata::load(&metadata_path(config, args.metadata));

    let defaults = config.combine.to_options();
    let mut options = defaults.clone();
    options.group_by_module = args.group_by_module || defaults.group_by_module;
    options.only_module = args.only_module;
    options.modules = args.modules;
    options.focus_modules = args.focus_modules;
    options.remove_internal_sources = args.remove_internal_sources;
    options.compound = args.compound || defaults.compound;
    options.concentrate = args.concentrate || defaults.concentrate;

    let exporter: Box<dyn GraphExporter> = match args.format {
        OutputFormat::Dot => Box::new(DotExporter),
        OutputFormat::Json => Box::new(JsonExporter { pretty: true }),
    };
    let usecase = CombineUsecase {
        store: &store,
        metadata: &metadata,
        exporter: exporter.as_ref(),
    };

    let graph = match &args.ids {
        Some(bit_id) => usecase.run_bit_id(bit_id, &options, &args.output)?,
        None => usecase.run(&store.ids(), &options, &args.output)?,
    };

    println!(
        "Combined {} definitions ({} nodes, {} edges) into {}",
        graph.definition_ids.len(),
        graph.nodes.len(),
        graph.edges.len(),
        args.output.display()
    );
    Ok(())
}

fn run_definitions(config: &Config, args: ListArgs) -> Result<()> {
    let store = load_store(config, args.definitions)?;
    let query = DefinitionQuery {
        title: args.title,
        source: args.source,
        definition_group: args.group,
    };
    let page = DefinitionEnumerator::new(&store, query).page(args.page, args.per);

    for definition in &page.definitions {
        println!(
            "{:>6}  {:<20}  {}",
            definition.id,
            definition.definition_group.as_deref().unwrap_or("-"),
            definition.title
        );
    }
    println!(
        "page {} ({} per page), {} matching of {} stored",
        page.page,
        page.per,
        page.total,
        store.len()
    );
    Ok(())
}

fn run_source(config: &Config, name: &str, definitions: Option<PathBuf>, metadata: Option<PathBuf>) -> Result<()> {
    let store = load_store(config, definitions)?;
    let metadata = Metadata::load(&metadata_path(config, metadata));

    let Some(report) = source_report(&store, &metadata, name) else {
        anyhow::bail!("Source '{}' does not appear in any definition", name);
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_modules(
    config: &Config,
    definitions: Option<PathBuf>,
    metadata: Option<PathBuf>,
    ids: Option<String>,
) -> Result<()> {
    let store = load_store(config, definitions)?;
    let metadata = Metadata::load(&metadata_path(config, metadata));

    let ids: Vec<DefinitionId> = match ids {
        Some(encoded) => bit_id::decode(&encoded)?.into_iter().collect(),
        None => store.ids(),
    };
    let selected = store.get_all(&ids);
    let definition = Definition::combine(0, COMBINED_TITLE, &selected);

    for (module, summary) in module_dependencies(&definition, &metadata) {
        let join = |names: Vec<&String>| names.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        println!("{}", module);
        println!("  sources:   {}", join(summary.sources.keys().collect()));
        println!("  calls:     {}", join(summary.module_dependencies.iter().collect()));
        println!("  called by: {}", join(summary.module_reverse_dependencies.iter().collect()));
    }
    Ok(())
}

fn run_alias(config: &Config, command: AliasCommand) -> Result<()> {
    match command {
        AliasCommand::Set {
            metadata,
            alias_name,
            source_names,
        } => {
            let path = metadata_path(config, metadata);
            Metadata::edit(&path, |metadata| metadata.source_alias().set_alias(&alias_name, &source_names))
                .with_context(|| format!("Failed to set alias '{}' in {}", alias_name, path.display()))?;
            info!(alias = %alias_name, members = source_names.len(), "alias updated");
        }
        AliasCommand::Rename {
            metadata,
            old_alias_name,
            new_alias_name,
            source_names,
        } => {
            let path = metadata_path(config, metadata);
            Metadata::edit(&path, |metadata| {
                metadata
                    .source_alias()
                    .rename_alias(&old_alias_name, &new_alias_name, &source_names)
            })
            .with_context(|| {
                format!(
                    "Failed to rename alias '{}' to '{}' in {}",
                    old_alias_name,
                    new_alias_name,
                    path.display()
                )
            })?;
            info!(from = %old_alias_name, to = %new_alias_name, "alias renamed");
        }
    }
    Ok(())
}

fn run_bit_id(command: BitIdCommand) -> Result<()> {
    match command {
        BitIdCommand::Encode { ids } => println!("{}", bit_id::encode(&ids)?),
        BitIdCommand::Decode { bit_id: encoded } => {
            let ids = bit_id::decode(&encoded)?;
            let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
            println!("{}", ids.join(" "));
        }
    }
    Ok(())
}
