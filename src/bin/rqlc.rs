//! rqlc: the RQL compiler CLI
//!
//! Compiles resource-query-language strings against collections declared in
//! `rqlc.toml`, explains how a clause parses, and runs relational queries.
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL for a query
//! rqlc compile 'eq(shipcity,Paris)&sort(-orderid)&limit(10)' -c orders
//!
//! # Show the parsed term tree
//! rqlc explain 'or(state=ga,age=lt=3)'
//!
//! # Execute against the configured database
//! rqlc run 'sw(shipcity,Lo)' -c orders --database-url sqlite://northwind.db
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use rqlc::ast::{functions, Term};
use rqlc::config::Config;
use rqlc::engine::{RelationalEngine, RequestScope, SqlxExecutor};
use rqlc::prelude::*;
use rqlc::result::Row;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rqlc")]
#[command(version)]
#[command(about = "Resource query language compiler", long_about = None)]
#[command(after_help = "EXAMPLES:
    rqlc compile 'eq(orderid,10257)' -c orders
    rqlc compile 'eq(type,X)&gt(date,2020-01-01)' -c items --format json
    rqlc explain 'freight=gt=30&sort(-orderdate)'
    rqlc run 'limit(5)' -c orders")]
struct Cli {
    /// Configuration file (default: ./rqlc.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query for a configured collection
    Compile {
        /// The query string, e.g. `eq(a,1)&sort(-b)`
        query: String,
        /// Target collection
        #[arg(short, long)]
        collection: String,
    },
    /// Show how a query string parses
    Explain {
        /// The query string
        query: String,
    },
    /// Execute a query against a relational collection
    Run {
        /// The query string
        query: String,
        /// Target collection
        #[arg(short, long)]
        collection: String,
        /// Database connection URL
        #[arg(long, env = "RQLC_DATABASE_URL")]
        database_url: Option<String>,
    },
    /// List the reserved function names
    Functions,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rqlc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rqlc=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Compile { query, collection } => {
            let config = Config::load(cli.config.as_deref())?;
            compile_query(&config, query, collection, cli.format)
        }
        Commands::Explain { query } => explain_query(query, cli.format),
        Commands::Run {
            query,
            collection,
            database_url,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            execute_query(&config, query, collection, database_url.as_deref(), cli.format).await
        }
        Commands::Functions => {
            show_functions();
            Ok(())
        }
    }
}

fn compile_query(config: &Config, query: &str, collection: &str, format: OutputFormat) -> Result<()> {
    let collection = config.collection(collection)?;
    let compiler = QueryCompiler::new(config.compile_options());
    let compiled = compiler.compile_str(query, collection)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
        return Ok(());
    }

    println!("{} {}", "Input:".dimmed(), query.yellow());
    println!(
        "{} {} ({})",
        "Collection:".dimmed(),
        collection.name.white(),
        collection.backend.to_string().cyan()
    );
    println!();

    match &compiled {
        CompiledQuery::Sql(sql) => {
            println!("{}", "Generated SQL:".green().bold());
            println!("  {}", sql.sql.white());
            if !sql.params.is_empty() {
                println!();
                println!("{}", "Bindings:".cyan());
                let generator = compiler.sql().generator();
                for (i, value) in sql.params.iter().enumerate() {
                    println!("  {} = {}", generator.placeholder(i + 1), value.to_string().yellow());
                }
            }
            println!();
            println!("{}", "Found rows:".green().bold());
            println!("  {}", sql.count_sql.white());
        }
        CompiledQuery::Dynamo(plan) => {
            println!(
                "{} {}",
                "Access plan:".green().bold(),
                format!("{:?}", plan.mode).cyan()
            );
            if let Some(index) = &plan.index {
                println!("  {} {}", "Index:".dimmed(), index.white());
            }
            println!();
            println!("{}", serde_json::to_string_pretty(&plan.to_request())?);
        }
        CompiledQuery::Elastic(search) => {
            println!("{} {}", "Search index:".green().bold(), search.index.white());
            println!();
            println!("{}", serde_json::to_string_pretty(&search.body)?);
        }
    }
    Ok(())
}

fn explain_query(query: &str, format: OutputFormat) -> Result<()> {
    let terms = rqlc::parser::parse_all(query)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&terms)?);
        return Ok(());
    }

    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!();
    println!("{}", "Terms:".green().bold());
    for term in &terms {
        println!("  {}", term.to_string().white());
        print_tree(term, 2);
    }
    Ok(())
}

fn print_tree(term: &Term, depth: usize) {
    let indent = "  ".repeat(depth);
    match term {
        Term::Function { name, args } => {
            println!("{}{}", indent, name.cyan());
            for arg in args {
                print_tree(arg, depth + 1);
            }
        }
        Term::Leaf { token, quote } => {
            let kind = match quote {
                Some('`') => "column",
                Some(_) => "string",
                None => "literal",
            };
            println!("{}{} {}", indent, token.yellow(), format!("({})", kind).dimmed());
        }
    }
}

async fn execute_query(
    config: &Config,
    query: &str,
    collection: &str,
    database_url: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let collection = config.collection(collection)?;
    if collection.backend != Backend::Relational {
        anyhow::bail!(
            "collection '{}' is {}; only relational collections can be executed",
            collection.name,
            collection.backend
        );
    }

    let url = database_url
        .or(config.database_url.as_deref())
        .context("no database URL. Use --database-url, RQLC_DATABASE_URL or database_url in rqlc.toml")?;

    let mut options = config.compile_options();
    if config.sql.dialect.is_none() {
        options.dialect = Dialect::from_url(url);
    }

    let parsed = Query::parse(query, collection.backend)?;
    let executor = SqlxExecutor::connect(url).await?;
    let engine = RelationalEngine::new(SqlCompiler::new(options), executor);
    let mut scope = RequestScope::new();
    let result = engine.select(&parsed, collection, &mut scope).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            format_rows(&result.rows);
            println!(
                "{} of {} row(s)",
                result.rows.len().to_string().cyan(),
                result.found_rows_or_unknown().to_string().cyan()
            );
            if let Some(next) = result.next_query_string() {
                println!("{} {}", "Next:".dimmed(), next.yellow());
            }
        }
    }
    Ok(())
}

fn format_rows(rows: &[Row]) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    let columns: Vec<&String> = rows[0].keys().collect();

    let mut widths: HashMap<&String, usize> = columns.iter().map(|c| (*c, c.len())).collect();
    for row in rows {
        for (col, val) in row {
            let len = val_to_string(val).len();
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(len);
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:width$}", c, width = widths[*c]))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[*c])).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                let val = row.get(*c).map(val_to_string).unwrap_or_default();
                format!("{:width$}", val, width = widths[*c])
            })
            .collect();
        println!("{}", cells.join(" │ "));
    }
    println!();
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn show_functions() {
    println!("{}", "RQL Function Reference".cyan().bold());
    println!();

    let groups: [(&str, Vec<&str>); 7] = [
        ("Comparison", functions::COMPARISON.to_vec()),
        ("Null checks", functions::NULL_CHECKS.to_vec()),
        ("Logical", functions::LOGICAL.to_vec()),
        ("Select", functions::SELECT.to_vec()),
        ("Order", functions::ORDER.to_vec()),
        ("Paging", functions::PAGE.to_vec()),
        (
            "Other",
            vec![functions::GROUP, functions::JOIN, functions::IF],
        ),
    ];

    for (title, names) in groups {
        println!("{:14} {}", title.white().bold(), names.join(", ").yellow());
    }

    println!();
    println!("{}", "Where clause support".white().bold());
    println!("{}", "─".repeat(40).dimmed());
    for backend in [Backend::Relational, Backend::KeyValue, Backend::Search] {
        println!(
            "{:14} {}",
            backend.to_string().cyan(),
            backend.where_functions().join(", ").dimmed()
        );
    }
}
