use anyhow::Result;
use clap::{Parser, Subcommand};
use gateway::{commands, logging, server};
use gateway_core::config;
use gateway_core::pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            tracing::info!("Starting up Enterprise LLM Security Gateway...");
            server::serve(cfg).await
        }
        Commands::Scan { text, json } => {
            let report = commands::scan(&cfg, &text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.safe {
                println!("SAFE");
            } else {
                println!("BLOCKED ({})", report.reason);
            }
            if !report.safe {
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::Anonymize { text, session } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let anon = commands::anonymize(&cfg, &text, &session).await?;
            println!("session: {}", session);
            println!("{}", anon.text);
            Ok(())
        }
        Commands::Deanonymize { text, session } => {
            println!("{}", commands::deanonymize(&cfg, &text, &session).await?);
            Ok(())
        }
        Commands::Purge { all } => {
            let purged = commands::purge(&cfg, all).await?;
            if all {
                println!("vault cleared");
            } else {
                println!("purged {} expired mapping(s)", purged);
            }
            Ok(())
        }
        Commands::Demo { gemini, model, json } => {
            if gemini {
                commands::use_gemini(&mut cfg);
            }
            let services = pipeline::build_services(&cfg).await?;
            let model = model
                .or_else(|| cfg.upstream.model.clone())
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string());
            let report = commands::demo(&services, &model).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("session: {}", report.session_id);
                println!("AI: {}", report.pii_reply);
                println!(
                    "PII restored: {}",
                    if report.pii_restored { "yes" } else { "no" }
                );
                println!(
                    "Injection blocked: {}",
                    if report.injection_blocked { "yes" } else { "no" }
                );
            }
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "LLM security gateway: prompt scanning and PII vaulting", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Listen host (default 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (default 8000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Scan a prompt; exits with status 2 when it is blocked
    Scan {
        text: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace PII in text with surrogates
    Anonymize {
        text: String,
        /// Vault session; a new one is generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
    /// Restore PII from a session's surrogates
    Deanonymize {
        text: String,
        #[arg(long)]
        session: String,
    },
    /// Drop expired vault mappings
    Purge {
        /// Remove every mapping, expired or not
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Run the secure chain against the configured upstream
    Demo {
        /// Use Gemini's OpenAI-compatible endpoint with GEMINI_API_KEY
        #[arg(long, default_value_t = false)]
        gemini: bool,
        #[arg(long)]
        model: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}
