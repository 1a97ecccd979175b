//! `ferrodesk ask`: one turn, envelope printed as JSON.

use ferrodesk_agent::build_orchestrator;
use ferrodesk_core::envelope::InboundRequest;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    prompt: String,
    user_id: String,
    session_id: Option<String>,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let orchestrator = build_orchestrator(&config).await;

    let mut request = InboundRequest::new(prompt, user_id);
    request.session_id = session_id;
    let envelope = orchestrator.handle(request).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if !envelope.success {
        // Non-zero exit for scripts; the envelope above has the details.
        std::process::exit(1);
    }
    Ok(())
}
