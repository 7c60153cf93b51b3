// ABOUTME: Terminal REPL for the TechSupport Pro assistant
// ABOUTME: Wires configuration, logging, the LLM provider and the tool server client together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # techdesk
//!
//! Interactive terminal front-end. Each line of input is one user turn;
//! slash commands manage the session:
//!
//! - `/clear` resets history and verification
//! - `/status` prints session and verification status
//! - `/quit` exits

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use techdesk::config::TechDeskConfig;
use techdesk::constants::messages;
use techdesk::errors::{AppError, AppResult, ErrorCode};
use techdesk::llm::{ChatProvider, LlmProvider};
use techdesk::logging::{init_logging, LoggingConfig};
use techdesk::mcp::McpClient;
use techdesk::orchestrator::{Orchestrator, OrchestratorSettings};
use techdesk::session::ConversationSession;

/// TechSupport Pro conversational assistant
#[derive(Debug, Parser)]
#[command(name = "techdesk", version, about)]
struct Cli {
    /// Tool server endpoint (overrides TECHDESK_MCP_SERVER_URL)
    #[arg(long)]
    server_url: Option<url::Url>,

    /// LLM provider: gemini or local (overrides TECHDESK_LLM_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Model name (overrides TECHDESK_LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// List the tools the server exposes and exit
    #[arg(long)]
    show_tools: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("techdesk: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    init_logging(&LoggingConfig::from_env())?;

    let mut config = TechDeskConfig::from_env()?;
    if let Some(server_url) = cli.server_url {
        config.server_url = server_url;
    }
    if let Some(provider) = cli.provider.as_deref() {
        config.provider = techdesk::config::LlmProviderKind::parse(provider);
    }
    if cli.model.is_some() {
        config.model = cli.model;
    }

    let mcp = McpClient::new(config.server_url.clone())?;

    if cli.show_tools {
        return show_tools(&mcp).await;
    }

    let provider = match ChatProvider::from_kind(config.provider) {
        Ok(provider) => provider,
        Err(e) if e.code == ErrorCode::ConfigMissing => {
            println!("{}", messages::MISSING_API_KEY);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    info!(
        provider = provider.name(),
        model = provider.default_model(),
        server = %config.server_url,
        "starting assistant"
    );

    let settings = OrchestratorSettings::from_config(&config);
    let orchestrator = Orchestrator::new(Box::new(provider), mcp, settings);
    let mut session = ConversationSession::new();

    println!("TechSupport Pro assistant ready. Type /quit to exit, /clear to reset.");
    repl(&orchestrator, &mut session).await
}

/// Print the server's tool listing
async fn show_tools(mcp: &McpClient) -> AppResult<()> {
    let tools = mcp.list_tools().await?;
    println!("{} tools available:", tools.len());
    for tool in tools {
        println!("  {:<22} {}", tool.name, tool.description);
    }
    Ok(())
}

/// Read-eval-print loop over stdin
async fn repl(orchestrator: &Orchestrator, session: &mut ConversationSession) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout
            .write_all(b"\n> ")
            .await
            .map_err(|e| AppError::internal(format!("stdout failed: {e}")))?;
        stdout
            .flush()
            .await
            .map_err(|e| AppError::internal(format!("stdout failed: {e}")))?;

        let line = tokio::select! {
            line = lines.next_line() => line
                .map_err(|e| AppError::internal(format!("stdin failed: {e}")))?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nGoodbye!");
                return Ok(());
            }
        };

        let Some(line) = line else {
            // EOF
            return Ok(());
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => {
                println!("Goodbye!");
                return Ok(());
            }
            "/clear" => {
                session.reset();
                println!("Session cleared. History and verification reset.");
            }
            "/status" => print_status(session),
            _ => {
                let reply = orchestrator.submit_user_turn(session, input).await;
                if !reply.tool_outcomes.is_empty() {
                    info!(count = reply.tool_outcomes.len(), "turn used tools");
                }
                println!("{}", reply.text);
            }
        }
    }
}

/// Render the `/status` display
fn print_status(session: &ConversationSession) {
    println!("Session:   {}", session.id);
    println!("Started:   {}", session.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Turns:     {}", session.turns().len());
    if session.verification().is_verified() {
        println!("Customer:  verified");
        if let Some(record) = session.verification().customer_record() {
            println!("{record}");
        }
    } else {
        println!("Customer:  not verified");
    }
}
