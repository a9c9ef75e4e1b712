use anyhow::Result;
use calbridge_core::engine::SyncEngine;
use owo_colors::OwoColorize;

pub async fn run(engine: SyncEngine) -> Result<()> {
    let summary = engine.run_pass().await?;

    if summary.counts.is_noop() {
        println!("{}", "Everything in sync, nothing to do".green());
    } else {
        println!(
            "Applied: {} created, {} updated, {} deleted",
            summary.counts.created.green(),
            summary.counts.updated.yellow(),
            summary.counts.deleted.red()
        );
    }

    if summary.counts.skipped > 0 {
        println!(
            "   {}",
            format!(
                "{} event(s) skipped, see the log; they will be retried next pass",
                summary.counts.skipped
            )
            .yellow()
        );
    }

    if summary.pairs_failed > 0 {
        anyhow::bail!("{} pair(s) failed to sync", summary.pairs_failed);
    }

    Ok(())
}
