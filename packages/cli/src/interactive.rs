//! Interactive menu shown when no subcommand is given.

use dialoguer::{Input, Select};
use wildfire_map_fire_models::Coordinates;
use wildfire_map_sync::SyncConfig;

use crate::session;

/// Top-level actions in the interactive menu.
enum Action {
    Fetch,
    Legend,
    Watch,
}

impl Action {
    const ALL: &[Self] = &[Self::Fetch, Self::Legend, Self::Watch];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Fetch => "Fetch detections around a point",
            Self::Legend => "Show severity legend",
            Self::Watch => "Start interactive viewport session",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt, a parse, or the chosen action fails.
pub async fn run(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Wildfire Map");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Fetch => {
            let lat_str: String = Input::new().with_prompt("Latitude").interact_text()?;
            let lng_str: String = Input::new().with_prompt("Longitude").interact_text()?;
            let radius_str: String = Input::new()
                .with_prompt("Radius (km)")
                .default(config.search_radius_km.to_string())
                .interact_text()?;

            let center = Coordinates::new(lat_str.trim().parse()?, lng_str.trim().parse()?);
            session::fetch(config, center, radius_str.trim().parse()?).await?;
        }
        Action::Legend => session::print_legend(),
        Action::Watch => session::watch(config).await?,
    }

    Ok(())
}
