use anyhow::Result;
use calbridge_core::config::{BridgeConfig, SyncMode};
use owo_colors::OwoColorize;

pub fn run(config: &BridgeConfig) -> Result<()> {
    if config.pairs.is_empty() {
        println!("{}", "No calendar pairs configured".yellow());
        println!("Set CALENDAR_PAIRS or add pairs to the config file.");
        return Ok(());
    }

    for pair in &config.pairs {
        let arrow = match pair.mode {
            SyncMode::TwoWay => "<->",
            SyncMode::OneWay => "->",
        };
        let mut line = format!("{} {} {}", pair.source, arrow, pair.target);
        if pair.privacy {
            line.push_str(&format!(
                " (privacy: \"{}\")",
                config.privacy_event_title
            ));
        }
        println!("{}", line);
    }

    Ok(())
}
