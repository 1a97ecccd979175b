//! `ferrodesk events`: list the short-term event log of a session.

use ferrodesk_core::memory::EventRole;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, user_id: &str, session_id: &str, limit: usize) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = ferrodesk_memory::build_from_config(&config.memory).await;
    if !store.is_available() {
        anyhow::bail!("memory backend '{}' is not available", config.memory.backend);
    }

    let actor_id = store.actor_id(user_id);
    let events = store.list_events(&actor_id, session_id, limit).await;

    println!("Events for {actor_id} in {session_id} ({} shown)", events.len());
    if events.is_empty() {
        println!("   No events logged.");
        return Ok(());
    }

    for event in &events {
        println!();
        println!("  [{}] {}", event.timestamp.format("%Y-%m-%d %H:%M:%S"), event.event_id);
        for message in &event.messages {
            let who = match message.role {
                EventRole::User => "customer",
                EventRole::Assistant => "agent",
            };
            println!("    {who:>8}: {}", message.content);
        }
    }
    Ok(())
}
