//! Install command implementation.

use console::style;
use std::time::Instant;
use tracing::debug;

use lt_io::{Engine, InstallState};

use crate::display::{InstallRenderer, progress_json_line};

/// Run the install command for a single app.
pub async fn run(engine: &Engine, app_id: &str, json_stream: bool) -> Result<(), lt_core::Error> {
    let start = Instant::now();
    let handle = engine.install(app_id).await?;

    let final_state = if json_stream {
        handle
            .wait_with(|progress| println!("{}", progress_json_line(progress)))
            .await
    } else {
        let name = engine
            .repository()
            .get(app_id)
            .map(|entry| entry.outcome.app.name)
            .unwrap_or_else(|| app_id.to_string());

        println!(
            "{} Updating {}",
            style("==>").cyan().bold(),
            style(&name).bold()
        );

        let mut renderer = InstallRenderer::new(&name);
        handle.wait_with(|progress| renderer.update(progress)).await
    };

    debug!(app = app_id, state = final_state.name(), "install finished");

    match final_state {
        InstallState::Failed(e) => Err(e),
        _ => {
            if !json_stream {
                println!(
                    "{} Finished in {}",
                    style("==>").cyan().bold(),
                    style(format!("{:.2}s", start.elapsed().as_secs_f64())).green()
                );
            }
            Ok(())
        }
    }
}
