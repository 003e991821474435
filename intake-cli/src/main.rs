use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;

use intake_llm::{Classifier, ClassifyRequest};

mod config;

#[derive(Parser, Debug)]
#[command(name = "intake", version, about = "Natural-language task intake")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse free-form text into structured tasks
    Parse {
        /// The text to parse, e.g. "Buy milk tomorrow, it's urgent"
        text: String,

        /// IANA timezone the text should be interpreted in
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Owner identity forwarded to the audit record
        #[arg(long, default_value = "demo-user")]
        user: String,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Print the schema text embedded in classifier prompts
    Schema,

    /// Config file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.intake/config.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Parse {
            text,
            timezone,
            user,
            json,
        } => {
            let cfg = config::load_config()?;
            let classifier = Classifier::new(config::resolve_llm_config(&cfg))
                .with_timeout(Duration::from_secs(cfg.llm.timeout_secs));

            let request = ClassifyRequest::new(text, user, timezone);
            let outcome = classifier.classify(&request).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_summary(&outcome);
            }
        }

        Command::Schema => {
            println!("{}", intake_core::schema_text());
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
        },
    }

    Ok(())
}

fn print_summary(outcome: &intake_llm::ClassifyOutcome) {
    println!(
        "Parsed {} task(s) via {} in {}ms{}\n",
        outcome.tasks.len(),
        outcome.model,
        outcome.latency_ms,
        if outcome.used_fallback { " (fallback)" } else { "" }
    );

    for t in &outcome.tasks {
        let deadline = t
            .deadline
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let estimate = t
            .estimated_minutes
            .map(|m| format!("{m}m"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "- [{}/{}] {} | due: {} | est: {} | tags: {}",
            t.priority.as_str(),
            t.category.as_str(),
            t.title,
            deadline,
            estimate,
            t.tags.join(",")
        );
    }

    if !outcome.issues.is_empty() {
        println!("\nIssues:");
        for issue in &outcome.issues {
            println!("- {issue}");
        }
    }
}
