use crate::dataset::GridDataset;
use crate::input::ProfileConfig;
use crate::time::{ForecastLeadHours, ModelRun};
use log::info;
use std::path::Path;
use std::time::Duration;

pub fn show_greeting(config_path: &Path) {
    info!("=== Eclipse Cloud Cover Forecast ===");
    info!("Loading configuration from: {}", config_path.display());
}

pub fn profile_echo(profile: &ProfileConfig) {
    let (west, east, south, north) = profile.bounds.edges();
    info!("Profile: {}", profile.name);
    info!("  Longitude: {} to {}", west, east);
    info!("  Latitude: {} to {}", south, north);
    info!("  Counties: {}", if profile.show_counties { "shown" } else { "hidden" });
    info!("  Markers: {}", profile.markers.len());
    info!("  Boundary layers: {}", profile.visible_boundaries().count());
}

pub fn show_run(run: ModelRun, lead: ForecastLeadHours) {
    info!("Model run: {} UTC", run);
    info!("Forecast hour: {}", lead);
}

pub fn show_dataset_summary(dataset: &GridDataset) {
    info!("Dataset:");
    for (key, value) in dataset.attributes() {
        info!("  {} = {}", key, value);
    }
    for dim in dataset.dimensions() {
        let first = dim.values.first().copied().unwrap_or(f64::NAN);
        let last = dim.values.last().copied().unwrap_or(f64::NAN);
        info!("  {}: {} ({} .. {})", dim.name, dim.len(), first, last);
    }
    for var in dataset.variables() {
        let valid = var.values.iter().filter(|v| !v.is_nan()).count();
        info!(
            "  {}: [{}] {} of {} values present",
            var.name,
            var.dims.join(", "),
            valid,
            var.values.len()
        );
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    info!("=== Done in {:.2}s ===", elapsed.as_secs_f64());
}
