use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use finsight_lib::application::UpsertContextRequest;
use finsight_lib::infrastructure::http_client::firestore_store;
use finsight_lib::settings::ContextStoreBackend;
use finsight_lib::{build_environment, init_tracing};

/// FinSight: AI fintech tool directory and insights concierge.
///
/// Credentials come from FINSIGHT_MODEL_API_KEY (or GEMINI_API_KEY / GOOGLE_API_KEY),
/// FINSIGHT_FIRESTORE_API_KEY and FINSIGHT_FIRESTORE_PROJECT. FINSIGHT_DATA_DIR
/// overrides the data directory and FINSIGHT_LOG sets the log filter.
#[derive(Parser)]
#[command(name = "finsight", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the AI FinTech Insights Concierge a question.
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List knowledge-base entries.
    Contexts,

    /// Add or replace a knowledge-base entry.
    AddContext {
        section: String,
        text: String,

        /// Reuse an id to replace that entry.
        #[arg(long)]
        id: Option<String>,

        /// Comma separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Delete a knowledge-base entry.
    RemoveContext { id: String },

    /// List directory tools.
    Tools,

    /// List published insights, newest first.
    Insights,

    /// List AI agents.
    Agents,

    /// Check the local store and report the active wiring.
    Health,

    /// Choose where the concierge reads its knowledge base from.
    UseStore {
        backend: StoreKind,

        /// Firestore project id.
        #[arg(long)]
        project: Option<String>,

        /// Firestore collection.
        #[arg(long, default_value = firestore_store::DEFAULT_COLLECTION)]
        collection: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Local,
    Firestore,
}

fn main() {
    init_tracing();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("[finsight] {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let handles = build_environment().context("failed to bootstrap FinSight environment")?;

    match cli.command {
        Command::Ask { question } => println!("{}", handles.concierge.ask(&question.join(" "))),
        Command::Contexts => print_json(&handles.catalog.list_contexts()?)?,
        Command::AddContext {
            section,
            text,
            id,
            tags,
        } => {
            let entry = handles.catalog.upsert_context(UpsertContextRequest {
                id,
                section,
                text,
                tags,
            })?;
            print_json(&entry)?;
        }
        Command::RemoveContext { id } => {
            handles.catalog.delete_context(&id)?;
            println!("removed {id}");
        }
        Command::Tools => print_json(&handles.catalog.list_tools()?)?,
        Command::Insights => print_json(&handles.catalog.list_insights()?)?,
        Command::Agents => print_json(&handles.catalog.list_agents()?)?,
        Command::Health => print_json(&handles.health()?)?,
        Command::UseStore {
            backend,
            project,
            collection,
        } => {
            let backend = match backend {
                StoreKind::Local => ContextStoreBackend::Local,
                StoreKind::Firestore => ContextStoreBackend::Firestore {
                    project_id: project,
                    collection,
                    base_url: firestore_store::DEFAULT_BASE_URL.into(),
                },
            };
            let updated = handles
                .config
                .update(|cfg| cfg.context_store = backend)
                .context("failed to save config")?;
            println!(
                "context store set to {} in {}",
                updated.context_store.id(),
                handles.config.path().display()
            );
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
