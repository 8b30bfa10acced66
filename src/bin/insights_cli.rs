use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;

use retail_insights::{
    config::{self, AppConfig},
    db::{self, ConnectionProvider, REPORT_TABLES},
    services::classifier::{classify_keywords, ParsedQuestion},
    AppState,
};

#[derive(Parser)]
#[command(
    name = "insights-cli",
    about = "Retail insights: store diagnostics and question answering",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check store connectivity, list tables and count report rows
    CheckConnection,
    /// Classify a question with the keyword rules only
    Classify {
        /// The question to classify
        question: String,
    },
    /// Answer a question end to end
    Ask {
        /// The question to answer
        question: String,
    },
}

#[derive(Debug, Serialize)]
struct ConnectionReport {
    database: String,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    tables: Vec<String>,
    row_counts: BTreeMap<String, TableCount>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TableCount {
    Rows(i64),
    Unavailable { error: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_stderr_tracing("warn");

    match cli.command {
        Commands::CheckConnection => handle_check_connection(cfg, cli.json).await?,
        Commands::Classify { question } => handle_classify(&question, cli.json)?,
        Commands::Ask { question } => handle_ask(cfg, &question, cli.json).await?,
    }

    Ok(())
}

async fn handle_check_connection(cfg: AppConfig, json: bool) -> Result<()> {
    let mut report = ConnectionReport {
        database: cfg.redacted_database_url(),
        connected: false,
        error: None,
        tables: Vec::new(),
        row_counts: BTreeMap::new(),
    };

    let provider = db::LazyConnection::from_app_config(&cfg);
    match provider.connection().await {
        Ok(pool) => {
            report.connected = true;
            report.tables = db::list_tables(&pool)
                .await
                .context("failed to list tables")?;
            for table in REPORT_TABLES {
                let count = match db::count_rows(&pool, table).await {
                    Ok(rows) => TableCount::Rows(rows),
                    Err(e) => TableCount::Unavailable {
                        error: e.to_string(),
                    },
                };
                report.row_counts.insert(table.to_string(), count);
            }
        }
        Err(e) => report.error = Some(e.response_message()),
    }

    if json {
        print_json(&report)?;
    } else {
        render_connection(&report);
    }

    if !report.connected {
        anyhow::bail!("store connection failed");
    }
    Ok(())
}

fn handle_classify(question: &str, json: bool) -> Result<()> {
    let parsed = classify_keywords(question);
    if json {
        print_json(&parsed)?;
    } else {
        render_parsed(&parsed)?;
    }
    Ok(())
}

async fn handle_ask(cfg: AppConfig, question: &str, json: bool) -> Result<()> {
    let state = AppState::from_config(cfg).context("failed to build application state")?;
    let answer = state
        .assistant
        .respond(question)
        .await
        .context("failed to answer question")?;

    if json {
        print_json(&answer)?;
    } else {
        println!("{}", answer.answer);
    }
    Ok(())
}

fn render_connection(report: &ConnectionReport) {
    println!("Database: {}", report.database);
    if let Some(error) = &report.error {
        println!("Connection failed: {}", error);
        return;
    }
    println!("Connection OK");
    println!("Tables ({}):", report.tables.len());
    for table in &report.tables {
        println!("- {}", table);
    }
    println!("Row counts:");
    for (table, count) in &report.row_counts {
        match count {
            TableCount::Rows(rows) => println!("- {}: {}", table, rows),
            TableCount::Unavailable { error } => println!("- {}: unavailable ({})", table, error),
        }
    }
}

fn render_parsed(parsed: &ParsedQuestion) -> Result<()> {
    println!("Kind: {}", parsed.kind);
    println!("Filters: {}", serde_json::to_string(&parsed.filters)?);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
