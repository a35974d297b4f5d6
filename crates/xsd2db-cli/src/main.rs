//! xsd2db CLI - create a relational database from an XSD schema.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use xsd2db::{Config, CreateReport, DatabaseStep, EngineKind, Orchestrator, Xsd2DbError};

#[derive(Parser)]
#[command(name = "xsd2db")]
#[command(about = "Create a relational database from an XSD schema")]
#[command(version)]
struct Cli {
    /// Schema file (.xsd is appended when no extension is given)
    #[arg(short = 's', long)]
    schema: Option<PathBuf>,

    /// Database type: sql, jet or oledb
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    engine: Option<String>,

    /// Server host for sql, catalog directory for jet
    #[arg(short = 'l', long)]
    location: Option<String>,

    /// Database name (defaults to the name in the schema)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Owner qualifier for tables [default: dbo]
    #[arg(short = 'o', long = "dbowner", value_name = "OWNER")]
    owner: Option<String>,

    /// Prefix for table names
    #[arg(short = 'p', long = "tableprefix", value_name = "PREFIX")]
    table_prefix: Option<String>,

    /// Create tables in an existing database
    #[arg(short = 'e', long)]
    existing: bool,

    /// Drop and recreate the database if it exists
    #[arg(short = 'f', long)]
    force: bool,

    /// Server port (sql)
    #[arg(long)]
    port: Option<u16>,

    /// Login name (sql)
    #[arg(long)]
    user: Option<String>,

    /// Login password (sql)
    #[arg(long)]
    password: Option<String>,

    /// Trust the server certificate without validation (sql)
    #[arg(long)]
    trust_server_cert: bool,

    /// Path to YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Write the DDL script to FILE ('-' for stdout) instead of connecting
    #[arg(long, value_name = "FILE")]
    script: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), Xsd2DbError> {
    setup_logging(&cli.verbosity, &cli.log_format).map_err(Xsd2DbError::Config)?;

    let config = build_config(&cli)?;
    let orchestrator = Orchestrator::new(config)?;

    if let Some(target) = &cli.script {
        let (script, compilation) = orchestrator.script()?;
        if target == "-" {
            print!("{}", script);
        } else {
            std::fs::write(target, &script)?;
            info!("Wrote {} statements to {}", compilation.statements.len(), target);
        }
        for warning in &compilation.warnings {
            warn!("{}", warning);
        }
        if !compilation.is_complete() {
            return Err(Xsd2DbError::Incomplete {
                failures: compilation.failures,
            });
        }
        return Ok(());
    }

    let mut report = orchestrator.run().await?;

    if cli.output_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    match report.take_failures() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Build the configuration from the optional file plus command-line overrides.
fn build_config(cli: &Cli) -> Result<Config, Xsd2DbError> {
    let engine = cli
        .engine
        .as_deref()
        .map(str::parse::<EngineKind>)
        .transpose()?;

    let mut config = match (&cli.config, engine) {
        (Some(path), _) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        (None, Some(engine)) => Config::new(engine),
        (None, None) => {
            return Err(Xsd2DbError::argument("type", "No database type given"));
        }
    };

    if let Some(engine) = engine {
        config.target.engine = engine;
    }
    if let Some(schema) = &cli.schema {
        config.schema_file = Some(schema.clone());
    }
    if let Some(name) = &cli.name {
        config.database = Some(name.clone());
    }
    if let Some(location) = &cli.location {
        config.target.location = Some(location.clone());
    }
    if let Some(port) = cli.port {
        config.target.port = port;
    }
    if let Some(user) = &cli.user {
        config.target.user = user.clone();
    }
    if let Some(password) = &cli.password {
        config.target.password = password.clone();
    }
    if cli.trust_server_cert {
        config.target.trust_server_cert = true;
    }
    if let Some(owner) = &cli.owner {
        config.create.owner = owner.clone();
    }
    if let Some(prefix) = &cli.table_prefix {
        config.create.table_prefix = prefix.clone();
    }
    if cli.force {
        config.create.overwrite = true;
    }
    if cli.existing {
        config.create.use_existing = true;
    }

    Ok(config)
}

fn print_summary(report: &CreateReport) {
    let step = match report.database_step {
        DatabaseStep::Created => "created",
        DatabaseStep::UsedExisting => "existing",
    };
    println!("\nDatabase {} ready on {}", report.database, report.engine);
    println!("  Database: {}", step);
    println!("  Tables: {}", report.tables_created);
    println!("  Primary keys: {}", report.primary_keys_created);
    println!("  Relations: {}", report.relations_created);
    println!("  Statements: {}", report.statements_executed);
    println!("  Duration: {:.2}s", report.duration_secs);
    if !report.skipped.is_empty() {
        println!("  Skipped: {}", report.skipped.len());
        for skipped in &report.skipped {
            println!("    - {}", skipped);
        }
    }
}

fn print_error(e: &Xsd2DbError) {
    match e {
        Xsd2DbError::SchemaNotFound(_) => eprintln!("{}", e),
        e if e.is_argument() => {
            eprintln!("-- Error --");
            eprintln!("{}", e);
            eprintln!();
            eprintln!("-- Instructions --");
            eprintln!("{}", Cli::command().render_help());
        }
        e => eprintln!("{}", e.format_detailed()),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
