use anyhow::Result;
use calbridge_core::backend::BackendRegistry;
use owo_colors::OwoColorize;

/// List every calendar each configured backend exposes, in
/// `<calendarId>@<backendName>` form ready for pair definitions.
pub async fn run(registry: &BackendRegistry) -> Result<()> {
    let mut first = true;
    for (name, backend) in registry.iter() {
        if !first {
            println!();
        }
        first = false;

        println!("{}", name.bold());
        match backend.list_calendars().await {
            Ok(calendars) if calendars.is_empty() => {
                println!("   {}", "no calendars".dimmed());
            }
            Ok(calendars) => {
                for cal in calendars {
                    println!("   {}@{}  {}", cal.id, name, cal.name.dimmed());
                }
            }
            Err(e) => println!("   {}", e.to_string().red()),
        }
    }

    if first {
        println!("{}", "No backends configured".yellow());
    }

    Ok(())
}
