//! `ferrodesk chat`: interactive conversation, one session per run.

use ferrodesk_agent::{Orchestrator, build_orchestrator, resolve_session_id};
use ferrodesk_core::envelope::{InboundRequest, ResponseEnvelope};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>, user_id: String, session_id: Option<String>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  WARNING: no API key configured, every turn will fail.");
        eprintln!("  Set FERRODESK_API_KEY or add provider.api_key to");
        eprintln!("    {}", super::config_file(config_path).display());
        eprintln!();
    }

    let orchestrator = build_orchestrator(&config).await;
    let session_id = resolve_session_id([session_id.as_deref()]);

    println!();
    println!("  ferrodesk chat");
    println!();
    println!("  Agent:     {}", orchestrator.identity().agent_name);
    println!("  Provider:  {} ({})", orchestrator.provider_name(), config.provider.model);
    println!("  Memory:    {}", orchestrator.memory().backend_name());
    println!("  Tools:     {}", orchestrator.tools().names().join(", "));
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your message and press Enter. 'help' lists commands.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "help" => print_help(),
            "history" => print_history(&orchestrator, &session_id).await,
            _ => {
                let request = InboundRequest::new(input, user_id.as_str()).with_session_id(session_id.as_str());
                let envelope = orchestrator.handle(request).await;
                print_reply(&envelope);
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_help() {
    println!("  help      show this list");
    println!("  history   show the turns kept for this session");
    println!("  exit      leave the chat");
}

async fn print_history(orchestrator: &Orchestrator, session_id: &str) {
    let Some(history) = orchestrator.sessions().snapshot(session_id).await else {
        println!("  (no turns yet)");
        return;
    };
    println!("  {} of {} turns kept", history.len(), history.cap());
    for turn in history.iter() {
        println!("    You   > {}", turn.user_message);
        println!("    Agent > {}", turn.agent_response);
    }
}

fn print_reply(envelope: &ResponseEnvelope) {
    println!();
    match (&envelope.data, &envelope.error) {
        (Some(data), _) => {
            for line in data.response.lines() {
                println!("  Agent > {line}");
            }
            let details = &data.execution_details;
            if !details.tools_used.is_empty() {
                println!("          tools: {}", details.tools_used.join(", "));
            }
            if details.need_to_escalate {
                println!("          [escalation requested]");
            }
        }
        (None, Some(error)) => eprintln!("  [{}] {}", error.error_type, error.message),
        (None, None) => eprintln!("  [Error] empty response"),
    }
    println!();
}
