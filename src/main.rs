//! querykit command-line interface.
//!
//! An interactive console flow: pick a data source and authentication mode,
//! open a session, run the minimum-price product query in text or
//! stored-procedure mode, and watch the rows land in a fixed-width table
//! and `products.json` at the same time. Finishes with the filtered
//! connection statistics and a supplier listing wrapped in a profiling
//! recorder.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use querykit::{
    list_suppliers, render_report, run_product_export, AuthMode, CommandDescriptor,
    ConnectProfile, Connector, DataSource, ProductJson, Recorder, Result, Session,
    DEFAULT_STAT_KEYS,
};

/// Interactive product catalog query and export tool
#[derive(Parser, Debug)]
#[command(
    name = "querykit",
    version,
    about = "Query a product catalog and export the results to a console table and a JSON file"
)]
struct Args {
    /// Path of the JSON artifact
    #[arg(long, default_value = "products.json", value_name = "FILE")]
    out: PathBuf,

    /// Country filter for the supplier listing
    #[arg(long, default_value = "Germany")]
    country: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("Error: {:#}", e).red());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Data source menu
    println!("Connect to:");
    println!("  1 - PostgreSQL on the local machine");
    println!("  2 - Hosted PostgreSQL (QUERYKIT_SERVER_URL)");
    println!("  3 - Embedded SQLite database");
    println!();
    let choice = prompt("Enter a number: ")?;
    let Some(source) = DataSource::from_choice(&choice) else {
        println!("No data source selected.");
        return Ok(ExitCode::FAILURE);
    };

    // Authentication menu (server sources only)
    let auth = if source.needs_auth() {
        println!();
        println!("Authenticate using:");
        println!("  1 - Trusted connection");
        println!("  2 - Login and password");
        println!();
        match prompt("Enter a number: ")?.trim() {
            "1" => AuthMode::Trusted,
            "2" => {
                let user = prompt("Enter your user ID: ")?;
                if user.trim().is_empty() {
                    println!("User ID cannot be empty.");
                    return Ok(ExitCode::FAILURE);
                }
                let password = prompt("Enter your password: ")?;
                if password.trim().is_empty() {
                    println!("Password cannot be empty.");
                    return Ok(ExitCode::FAILURE);
                }
                AuthMode::Login {
                    user: user.trim().to_string(),
                    password: password.trim().to_string(),
                }
            }
            _ => {
                println!("No authentication selected.");
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        AuthMode::Trusted
    };

    let profile = ConnectProfile::new(source, auth);
    let url = match profile.url() {
        Ok(url) => url,
        Err(e) => {
            println!("{}", e.to_string().red());
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("{}", profile.display_url()?);
    println!();

    println!(
        "Opening connection. Please wait up to {} seconds...",
        profile.connect_timeout_secs()
    );
    println!();

    let opened = Connector::new(&url)
        .on_state_change(|from, to| {
            println!("{}", format!("Connection state: {} -> {}", from, to).dimmed());
        })
        .on_message(|message| {
            println!(
                "{}",
                format!("Server message [{}]: {}", message.severity, message.text).yellow()
            );
        })
        .open()
        .await;

    let mut session = match opened {
        Ok(session) => session,
        Err(e) => {
            println!("{}", e.to_string().red());
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(version) = session.server_version() {
        println!("Server version: {}", version);
    }
    println!();

    // Everything after open runs behind a guaranteed close.
    let outcome = run_flow(&mut session, &args).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "session close failed");
    }

    match outcome {
        Ok(code) => Ok(code),
        Err(e) => {
            println!("{}", e.to_string().red());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// The part of the flow that needs an open session. Errors propagate to the
/// caller after the session is closed.
async fn run_flow(session: &mut Session, args: &Args) -> Result<ExitCode> {
    // Minimum price; validated before any execution
    let price_text = prompt("Enter a minimum unit price: ")?;
    let Ok(price) = price_text.trim().parse::<f64>() else {
        println!("You must enter a valid unit price.");
        return Ok(ExitCode::FAILURE);
    };

    println!();
    println!("Execute command using:");
    println!("  1 - Text");
    println!("  2 - Stored procedure");
    println!();
    let descriptor = match prompt("Enter a number: ")?.trim() {
        "1" => CommandDescriptor::products_over(price),
        "2" => CommandDescriptor::products_over_proc(price),
        _ => {
            println!("No command mode selected.");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!();

    let mut stdout = io::stdout();
    let summary = run_product_export(session, &descriptor, &args.out, &mut stdout).await?;

    let full_path = std::env::current_dir()
        .map(|dir| dir.join(&summary.json_path))
        .unwrap_or_else(|_| summary.json_path.clone());
    println!("{}", format!("Written to: {}", full_path.display()).green());

    let echo: Vec<ProductJson> = summary.products.iter().map(ProductJson::from).collect();
    println!("{}", serde_json::to_string(&echo).unwrap_or_default().magenta());

    if let Some(outputs) = summary.outputs {
        println!("Output count: {}", outputs.count);
        println!("Return value: {}", outputs.return_value);
    }
    println!();

    let snapshot = session.statistics();
    for line in render_report(&snapshot, &DEFAULT_STAT_KEYS) {
        println!("{}", line.cyan());
    }
    println!();

    // Supplier listing, profiled with an explicit before/after diff
    println!("{}", format!("Suppliers in {}", args.country).green());
    let recorder = Recorder::start(session.counters());
    let suppliers = list_suppliers(session, &args.country, &mut stdout).await?;
    println!(
        "{}",
        serde_json::to_string(&suppliers).unwrap_or_default().green()
    );
    for line in recorder.stop(session.counters()) {
        println!("{}", line.cyan());
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("querykit=debug")
    } else {
        EnvFilter::new("querykit=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Print a prompt and read one trimmed line from stdin.
fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
