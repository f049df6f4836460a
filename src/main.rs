use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use excel_analytics::utils::{init_logger, DEFAULT_LOG_FILTER};
use excel_analytics::{Config, Session, TurnInput};

#[derive(Parser)]
#[command(name = "excel-analytics")]
#[command(about = "Load spreadsheets into DuckDB and query them with SQL or plain language")]
struct Args {
    /// Spreadsheet to load before running the command (repeatable)
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,

    /// Table name for the loaded file (only with a single --file)
    #[arg(short, long)]
    table: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List loaded tables
    Tables,
    /// Run a literal SQL query
    Sql { query: String },
    /// Ask a question in natural language
    Ask { question: String },
    /// Column summary of one table
    Describe { table: String },
    /// Replay a host chat turn from a JSON file ({"messages": [...], "files": [...]})
    Turn { payload: PathBuf },
    /// Interactive session
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger(DEFAULT_LOG_FILTER);

    let args = Args::parse();
    let config = Config::from_env()?;
    let mut session = Session::from_config(config)?;

    if args.table.is_some() && args.files.len() > 1 {
        anyhow::bail!("--table can only be used with a single --file");
    }
    for path in &args.files {
        println!("{}\n", session.load_excel(&path.display().to_string(), args.table.as_deref()));
    }

    match args.command {
        Command::Tables => println!("{}", session.list_tables()),
        Command::Sql { query } => println!("{}", session.query_sql(&query)),
        Command::Ask { question } => println!("{}", session.ask(&question).await),
        Command::Describe { table } => println!("{}", session.describe_table(&table)),
        Command::Turn { payload } => {
            let raw = std::fs::read_to_string(&payload)
                .with_context(|| format!("Failed to read {}", payload.display()))?;
            let body: serde_json::Value = serde_json::from_str(&raw).context("Turn payload is not valid JSON")?;
            let turn = TurnInput::from_host_payload(&body, body.get("files"));
            println!("{}", session.handle_turn(&turn).await);
        }
        Command::Repl => repl(&mut session).await?,
    }

    Ok(())
}

async fn repl(session: &mut Session) -> Result<()> {
    info!("Starting interactive session");
    println!("{}. Type \\quit to exit.", session.display_name());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let output = match command {
            "\\quit" | "\\q" => break,
            "\\tables" => session.list_tables(),
            "\\sql" => session.query_sql(rest),
            "\\describe" => session.describe_table(rest),
            "\\load" => {
                let mut parts = rest.split_whitespace();
                match parts.next() {
                    Some(path) => session.load_excel(path, parts.next()),
                    None => "Usage: \\load PATH [TABLE]".to_string(),
                }
            }
            _ if command.starts_with('\\') => format!("Unknown command {command}"),
            _ => session.ask(line).await,
        };
        println!("{output}\n");
    }

    Ok(())
}
