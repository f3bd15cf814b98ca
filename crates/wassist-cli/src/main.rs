use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod bootstrap;

use bootstrap::bootstrap;
use wassist_channels::{ConsoleMessenger, TwilioMessenger};
use wassist_core::load_config;
use wassist_gateway::Gateway;
use wassist_schema::InboundMessage;
use wassist_server::{serve, AppState};

#[derive(Parser)]
#[command(name = "wassist", version, about = "WhatsApp personal assistant")]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Root directory (contains config/, data/ and logs/)"
    )]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the webhook server")]
    Start {
        #[arg(long, help = "Listen address, overrides server.listen")]
        listen: Option<String>,
    },
    #[command(about = "Validate config files")]
    Validate,
    #[command(about = "Local REPL for testing (no Twilio needed)")]
    Chat {
        #[arg(long, default_value = "whatsapp:+10000000000", help = "Sender to impersonate")]
        sender: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = cli.root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "wassist.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.root.join("config"))?;
            println!(
                "Config valid. model={}, offset=UTC{:+}, memory={}, web search={}.",
                config.llm.model,
                config.app.utc_offset_hours,
                if config.memory.enabled { "on" } else { "off" },
                if config.web_search.enabled { "on" } else { "off" },
            );
        }
        Commands::Start { listen } => {
            start_server(&cli.root, listen).await?;
        }
        Commands::Chat { sender } => {
            run_repl(&cli.root, &sender).await?;
        }
    }

    Ok(())
}

async fn start_server(root: &Path, listen: Option<String>) -> Result<()> {
    let app = bootstrap(root).await?;
    let messenger = Arc::new(TwilioMessenger::from_config(
        &app.config.twilio,
        app.config.timeouts.connector(),
    ));
    let gateway = Arc::new(Gateway::new(
        app.dispatcher.clone(),
        messenger,
        app.bus.publisher(),
    ));
    let state = AppState {
        gateway,
        memory: app.memory.clone(),
    };
    let addr = listen.unwrap_or_else(|| app.config.server.listen.clone());

    tokio::select! {
        result = serve(state, &addr) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    if let Some(writer) = app.memory_writer {
        writer.abort();
    }
    Ok(())
}

async fn run_repl(root: &Path, sender: &str) -> Result<()> {
    let app = bootstrap(root).await?;
    let gateway = Gateway::new(
        app.dispatcher.clone(),
        Arc::new(ConsoleMessenger::stdout()),
        app.bus.publisher(),
    );

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("wassist REPL as {sender}. Type 'quit' to exit.\n---\n> ").as_bytes())
        .await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }
        let inbound = InboundMessage::new("console", sender, input);
        if let Err(err) = gateway.process(inbound).await {
            eprintln!("Error: {err}");
        }
    }

    if let Some(writer) = app.memory_writer {
        writer.abort();
    }
    Ok(())
}
