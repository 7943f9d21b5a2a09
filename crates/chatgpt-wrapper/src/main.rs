//! chatgpt-wrapper: ChatGPT from the command line through a browser session
//!
//! Usage:
//!   chatgpt-wrapper install        - Log in interactively in a visible browser
//!   chatgpt-wrapper <prompt...>    - Answer one prompt and exit
//!   chatgpt-wrapper                - Start the interactive REPL

mod cli;
mod transcript;

use std::path::PathBuf;
use std::sync::Arc;

use cgw_browser::{BrowserConfig, BrowserSession, ChromePage};
use cgw_core::{ChatGpt, Config};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::CliOptions;
use crate::transcript::Transcript;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "chatgpt-wrapper", version, about = "Use ChatGPT from the terminal through your browser session")]
struct Args {
    /// Use 'install' for install mode, or provide a prompt for ChatGPT
    params: Vec<String>,

    /// Print the reply as it streams in
    #[arg(short, long)]
    stream: bool,

    /// Append prompts and replies to the named file
    #[arg(short, long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Preferred browser: 'firefox', 'chromium' or 'webkit'
    #[arg(short, long, value_name = "ENGINE")]
    browser: Option<String>,

    /// Config file (default: ./chatgpt-wrapper.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Visible browser for an interactive login
    Install,
    /// Answer one prompt
    Prompt(String),
    /// Interactive REPL
    Repl,
}

impl Args {
    fn mode(&self) -> RunMode {
        match self.params.as_slice() {
            [] => RunMode::Repl,
            [only] if only == "install" => RunMode::Install,
            params => RunMode::Prompt(params.join(" ")),
        }
    }

    /// Config file, env, then these flags
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::load()?,
        };

        if let Some(engine) = &self.browser {
            config.browser.engine = engine.clone();
        }
        if let Some(log) = &self.log {
            config.log.file = Some(log.clone());
        }
        if self.mode() == RunMode::Install {
            config.browser.headless = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mode = args.mode();

    dotenvy::dotenv().ok();

    // Keep diagnostics off the reply stream unless asked for
    let default_level = if mode == RunMode::Install { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.load_config()?;

    tracing::info!("Starting chatgpt-wrapper...");
    tracing::info!("Model: {}", config.backend.model);

    let browser_config = BrowserConfig::from_settings(&config.browser);
    let session = tokio::task::spawn_blocking(move || BrowserSession::launch(browser_config))
        .await??;
    tracing::info!("Browser engine: {}", session.engine());

    let chatgpt = ChatGpt::new(Arc::new(ChromePage::new(session)), &config);
    chatgpt.open().await?;

    let options = CliOptions {
        stream: args.stream,
        transcript: Transcript::new(config.log.file.clone()),
    };

    match mode {
        RunMode::Install => run_install().await,
        RunMode::Prompt(prompt) => cli::run_once(&chatgpt, &prompt, &options).await,
        RunMode::Repl => cli::run_repl(&chatgpt, &options).await,
    }
}

/// Keep the visible browser open until the user has logged in
async fn run_install() -> anyhow::Result<()> {
    println!(
        "Install mode: Log in to ChatGPT in the browser that pops up, and click\n\
         through all the dialogs, etc. Once that is achieved, press Enter here,\n\
         then restart this program without the 'install' parameter.\n"
    );

    let wait_for_enter = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    });

    tokio::select! {
        result = wait_for_enter => result??,
        _ = tokio::signal::ctrl_c() => {}
    }

    tracing::info!("Install mode finished; profile saved");
    Ok(())
}
