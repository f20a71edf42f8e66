//! The `doctor` command: environment and configuration report.

use anyhow::Result;
use sable_core::config::SableConfig;
use sable_interaction::InteractionManager;

pub async fn run(manager: &InteractionManager, config: &SableConfig) -> Result<()> {
    let available = manager.tool_available().await;

    println!("sable doctor");
    println!("  tool binary:          {}", config.tool.binary);
    println!(
        "  tool on PATH:         {}",
        if available { "yes" } else { "NO - install it or set tool.binary" }
    );
    println!(
        "  model:                {}",
        config.tool.model.as_deref().unwrap_or("(tool default)")
    );
    println!("  attempt timeout:      {}s", config.budget.attempt_timeout_secs);
    println!(
        "  interactive timeout:  {}s",
        config.budget.interactive_timeout_secs
    );
    println!("  max history length:   {}", config.limits.max_history_length);
    println!(
        "  compression threshold: {}",
        config.limits.compression_threshold
    );
    println!(
        "  auto answer:          {}",
        if config.auto_answer { "on" } else { "off (human prompt)" }
    );
    Ok(())
}
