//! List command implementation.

use console::style;

use lt_io::Engine;

use crate::display::{ListedApp, format_installed_line, print_json};

/// Print installed apps without contacting any update source.
pub fn run(engine: &Engine, json: bool) -> Result<(), lt_core::Error> {
    let apps = engine.list_apps();

    if json {
        let listed: Vec<ListedApp<'_>> = apps.iter().map(ListedApp::from).collect();
        print_json(&listed);
        return Ok(());
    }

    if apps.is_empty() {
        println!("No apps found.");
        return Ok(());
    }

    println!(
        "{} {} installed apps:",
        style("==>").cyan().bold(),
        style(apps.len()).green().bold()
    );
    println!();
    for app in &apps {
        println!("    {}", format_installed_line(app));
    }

    Ok(())
}
