//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::app::App;
use crate::config::loader::load_config;
use crate::config::schema::TicketRankConfig;
use crate::error::{Result, TicketRankError};
use crate::ingest::{load_tickets_file, save_tickets_file, IngestReport};
use crate::search::format::format_results;
use crate::search::tokenizer::{build_lexical_query, extract_keywords};
use crate::server::{run_http_server, run_stdio_server};
use crate::types::RawTicket;

#[derive(Debug, Parser)]
#[command(name = "ticketrank")]
#[command(about = "Find past support tickets similar to a new one")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ./.ticketrank.yaml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding database.path
    #[arg(long, global = true)]
    pub db: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database and pin the embedding dimension
    Init,

    /// Ingest tickets from a JSON file
    Ingest {
        /// Array of tickets, or an object with a "tickets" array
        file: PathBuf,
    },

    /// Download tickets from the helpdesk into a JSON file
    Fetch {
        /// Output file
        #[arg(long, default_value = "tickets.json")]
        out: PathBuf,

        /// Ingest the fetched tickets as well
        #[arg(long)]
        ingest: bool,
    },

    /// Rank stored tickets against a query
    #[command(visible_alias = "s")]
    Search {
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the keywords and lexical query derived from a query
    Keywords { query: String },

    /// Show corpus statistics
    Stats,

    /// Serve MCP over stdio, or HTTP routes plus MCP when --http is given
    Serve {
        /// Listen address, e.g. 127.0.0.1:8000
        #[arg(long)]
        http: Option<String>,
    },
}

fn resolve_config(cli: &Cli) -> Result<TicketRankConfig> {
    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = load_config(cli.config.as_deref(), &project_root)?;
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    Ok(config)
}

pub fn run(cli: Cli) -> Result<()> {
    // Needs neither config nor database.
    if let Commands::Keywords { query } = &cli.command {
        let keywords = extract_keywords(query);
        println!("keywords:      {}", keywords.join(", "));
        println!("lexical query: {}", build_lexical_query(&keywords));
        return Ok(());
    }

    let app = App::from_env(resolve_config(&cli)?)?;
    match cli.command {
        Commands::Init => {
            let stats = app.stats()?;
            println!(
                "{} {} ({}-dimensional, {} tickets)",
                style("initialized").green().bold(),
                app.config().database.path,
                stats.dimension,
                stats.tickets
            );
        }
        Commands::Ingest { file } => {
            let tickets = load_tickets_file(&file)?;
            let report = ingest_with_bar(&app, &tickets)?;
            print_report(&report);
        }
        Commands::Fetch { out, ingest } => {
            let helpdesk = app.helpdesk().ok_or_else(|| {
                TicketRankError::Config(
                    "helpdesk.domain (or FRESHDESK_DOMAIN) is not configured".into(),
                )
            })?;
            let tickets = helpdesk.list_tickets()?;
            save_tickets_file(&out, &tickets)?;
            println!(
                "{} {} tickets to {}",
                style("saved").green().bold(),
                tickets.len(),
                out.display()
            );
            if ingest {
                print_report(&ingest_with_bar(&app, &tickets)?);
            }
        }
        Commands::Search { query, json } => {
            let ranked = app.service().search(&query)?;
            if json {
                let out = json!({
                    "query": query,
                    "keywords": extract_keywords(&query),
                    "results": ranked,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", format_results(&ranked));
                if ranked.is_empty() {
                    println!();
                }
            }
        }
        Commands::Stats => {
            let stats = app.stats()?;
            let out = json!({
                "database": app.config().database.path,
                "embedder": app.embedder().name(),
                "tickets": stats.tickets,
                "embeddings": stats.embeddings,
                "dimension": stats.dimension,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Serve { http } => serve(&app, http.as_deref())?,
        Commands::Keywords { .. } => {}
    }
    Ok(())
}

/// Run a server on a fresh runtime. `app` outlives the runtime so blocking
/// HTTP clients are never dropped inside it.
fn serve(app: &App, http: Option<&str>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(async {
        let served = match http {
            Some(addr) => run_http_server(app.clone(), addr).await,
            None => run_stdio_server(app.clone()).await,
        };
        served.map_err(|e| e.to_string())
    });
    runtime.shutdown_background();
    served.map_err(TicketRankError::Other)
}

fn ingest_with_bar(app: &App, tickets: &[RawTicket]) -> Result<IngestReport> {
    let bar = ProgressBar::new(tickets.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| TicketRankError::Other(e.to_string()))?
            .progress_chars("=> "),
    );
    let report = app.ingest(tickets, |raw| {
        bar.set_message(format!("#{}", raw.id));
        bar.inc(1);
    });
    bar.finish_and_clear();
    report
}

fn print_report(report: &IngestReport) {
    println!(
        "{} {} tickets: {} inserted, {} updated, {} unchanged, {} failed",
        style("ingested").green().bold(),
        report.total,
        report.inserted,
        report.updated,
        report.unchanged,
        report.failed
    );
    for (ticket_id, error) in &report.failures {
        println!("  {} #{ticket_id}: {error}", style("failed").red());
    }
}
