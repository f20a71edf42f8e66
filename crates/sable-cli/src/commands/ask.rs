//! The `ask` command: one round trip through the resilience layer.

use anyhow::Result;
use sable_interaction::InteractionManager;
use std::path::Path;

pub async fn run(
    manager: &InteractionManager,
    prompt: &str,
    project: &Path,
    context: Option<&str>,
    one_shot: bool,
) -> Result<()> {
    if one_shot {
        let outcome = manager.one_shot(prompt, project).await;
        println!("{}", outcome.text);
        eprintln!("[tokens: {}]", outcome.token_estimate);
        return Ok(());
    }

    let session_id = manager.start_or_get_session(project).await;
    let reply = manager.send_message(&session_id, prompt, context).await?;
    println!("{}", reply.response);
    eprintln!("[session: {} | tokens: {}]", session_id, reply.tokens_used);
    Ok(())
}
