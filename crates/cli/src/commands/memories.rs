//! `ferrodesk memories`: inspect the long-term namespaces of a customer.

use ferrodesk_core::memory::NamespaceKind;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, user_id: &str, session_id: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = ferrodesk_memory::build_from_config(&config.memory).await;
    if !store.is_available() {
        anyhow::bail!("memory backend '{}' is not available", config.memory.backend);
    }

    let actor_id = store.actor_id(user_id);
    let memory = store.retrieve_all(&actor_id, session_id).await;

    println!("Memory for {actor_id} ({} backend)", store.backend_name());
    for kind in NamespaceKind::ALL {
        let records = memory.get(kind);
        let namespace = store
            .namespaces()
            .resolve(kind, &actor_id, session_id)
            .unwrap_or_else(|_| "(needs --session-id)".into());

        println!();
        println!("  {kind}  {namespace}");
        if records.is_empty() {
            println!("    (empty)");
        }
        for record in records {
            println!("    [score: {:.2}] {}", record.score, record.content);
        }
    }

    println!();
    println!("  {} record(s) total", memory.total());
    Ok(())
}
