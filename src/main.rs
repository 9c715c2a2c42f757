//! factcards CLI: ask questions, get flashcards backed by Wikidata.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use factcards::config::{Config, Mode};
use factcards::flashcard::FlashcardDeck;
use factcards::graph::WikidataClient;
use factcards::identifier::IdKind;
use factcards::paths::FactcardsPaths;
use factcards::pipeline::{KnowledgeEngine, PipelineOutcome, Source};
use factcards::resolve::Resolver;

#[derive(Parser)]
#[command(
    name = "factcards",
    version,
    about = "Question answering over Wikidata, as flashcards"
)]
struct Cli {
    /// Config file (TOML, or a legacy keys.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question and print the flashcard deck.
    Ask {
        question: String,

        /// Extraction mode (defaults to `pipeline.mode` from the config).
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// Print the full pipeline outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract themes from text without querying the graph.
    Themes { text: String },

    /// Resolve a term to a Wikidata id.
    Resolve {
        term: String,

        /// Resolve as a property instead of an item.
        #[arg(long)]
        property: bool,
    },

    /// Manage the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config with the API key masked.
    Show,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => FactcardsPaths::resolve()?.config_file(),
    };

    match cli.command {
        Commands::Ask {
            question,
            mode,
            json,
        } => {
            let config = load_config(&config_path, cli.config.is_some())?;
            let engine = KnowledgeEngine::from_config(&config)?;
            let mode = mode.unwrap_or(config.pipeline.mode);
            let outcome = engine.answer_with_mode(&question, mode);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).into_diagnostic()?
                );
                return Ok(());
            }

            match outcome {
                PipelineOutcome::Answered(report) => {
                    print!("{}", FlashcardDeck::from(&report.answer));
                    println!();
                    match report.source {
                        Source::Graph => {
                            println!("Source: Wikidata ({} facts) + LLM", report.facts.len())
                        }
                        Source::LlmOnly => println!("Source: LLM only, no Wikidata facts found"),
                    }
                    if report.answer.fallback {
                        println!("(the model did not return structured output)");
                    }
                }
                PipelineOutcome::NoResult { extraction, issues } => {
                    println!(
                        "Nothing in the question matched a Wikidata entry ({} terms tried, {} failures).",
                        extraction.len(),
                        issues.len()
                    );
                }
                PipelineOutcome::Failed { error, .. } => return Err(error.into()),
            }
        }

        Commands::Themes { text } => {
            let config = load_config(&config_path, cli.config.is_some())?;
            let engine = KnowledgeEngine::from_config(&config)?;
            let extraction = engine.extract(&text, Mode::Themes)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&extraction).into_diagnostic()?
            );
        }

        Commands::Resolve { term, property } => {
            let config = load_config(&config_path, cli.config.is_some())?;
            let graph = WikidataClient::new(config.graph.clone());
            let kind = if property {
                IdKind::Property
            } else {
                IdKind::Entity
            };
            let id = Resolver::new(&graph).try_resolve(&term, kind)?;
            println!("{id}");
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                Config::init(&config_path, force)?;
                println!("Wrote default config to {}", config_path.display());
                println!("Set llm.api_key there, or export FACTCARDS_API_KEY.");
            }
            ConfigAction::Show => {
                let config = load_config(&config_path, cli.config.is_some())?;
                println!("# {}", config_path.display());
                print!(
                    "{}",
                    toml::to_string_pretty(&config.redacted()).into_diagnostic()?
                );
            }
        },
    }

    Ok(())
}

/// An explicit `--config` must exist; the default location may be absent.
fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    let config = if explicit || path.exists() {
        Config::load(path)?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };
    Ok(config.with_env_overrides())
}
