//! Session housekeeping commands.

use anyhow::Result;
use sable_interaction::InteractionManager;

pub async fn evict(manager: &InteractionManager, max_age_hours: i64) -> Result<()> {
    let evicted = manager
        .store()
        .evict_older_than(chrono::Duration::hours(max_age_hours))
        .await;
    println!("Evicted {} session(s) idle longer than {}h", evicted, max_age_hours);
    Ok(())
}
