//! # eclipse_clouds
//!
//! Forecast maps of GFS total cloud cover for the 2024-04-08 total solar
//! eclipse.
//!
//! ## Features
//!
//! - **Run selection**: the latest six-hourly GFS run, or an explicit one, and
//!   the whole-day forecast lead that reaches the eclipse
//! - **Cached downloads**: each run and lead is fetched from the archive at
//!   most once, with an atomic write into the cache directory
//! - **Coordinate normalization**: longitudes moved from [0, 360) to
//!   (-180, 180] with the data kept under its labels
//! - **Region cropping**: inclusive latitude / longitude ranges per profile
//! - **Rendering**: Mercator map with 5 % cloud cover classes, boundary
//!   layers, markers and a colour bar, written as JPEG
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eclipse_clouds::archive::{DEFAULT_ARCHIVE_URL, GridFetcher, HttpArchive};
//! use eclipse_clouds::input::ConfigFile;
//! use eclipse_clouds::render::RenderOptions;
//! use eclipse_clouds::time::{closest_model_run, parse_target, ECLIPSE_TARGET};
//! use eclipse_clouds::run_forecast_map;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::from_file("config.json")?;
//! let profile = config.profile("conus")?;
//!
//! let client = HttpArchive::new(Duration::from_secs(600))?;
//! let fetcher = GridFetcher::new(client, ".", DEFAULT_ARCHIVE_URL);
//! let run = closest_model_run(chrono::Utc::now());
//! let target = parse_target(ECLIPSE_TARGET)?;
//!
//! let map = run_forecast_map(&fetcher, profile, run, target, ".".as_ref(), &RenderOptions::default()).await?;
//! println!("Wrote {}", map.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "conus": {
//!     "name": "conus",
//!     "lonMin": -105.0, "lonMax": -65.0,
//!     "latMin": 24.0, "latMax": 50.0,
//!     "showCounties": false
//!   }
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod filters;
pub mod grib;
pub mod info;
pub mod input;
pub mod log;
pub mod normalize;
pub mod render;
pub mod storage;
pub mod time;

#[cfg(test)]
mod tests;

use crate::archive::{ArchiveClient, GridFetcher};
use crate::error::ForecastResult;
use crate::extract::crop_dataset;
use crate::grib::{TCC_VARIABLE, load_total_cloud_cover};
use crate::input::ProfileConfig;
use crate::log::{show_dataset_summary, show_run};
use crate::normalize::normalize_longitude;
use crate::render::{RenderOptions, encode_jpeg, map_title, output_file_name, render_map};
use crate::storage::{LocalStorage, StorageBackend, StorageError};
use crate::time::{ForecastLeadHours, ModelRun, lead_hours_for_target};
use ::log::info;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Resolves the lead for `target` and makes sure its GRIB file is cached.
///
/// Returns the lead together with the local path of the file.
pub async fn fetch_forecast<C: ArchiveClient, S: StorageBackend>(
    fetcher: &GridFetcher<C, S>,
    run: ModelRun,
    target: DateTime<Utc>,
) -> ForecastResult<(ForecastLeadHours, PathBuf)> {
    let lead = lead_hours_for_target(run, target)?;
    show_run(run, lead);
    let path = fetcher.fetch(run, lead).await?;
    Ok((lead, path))
}

/// Produces the cloud cover map of one profile.
///
/// This function orchestrates the entire pipeline:
/// 1. Resolves the forecast lead from `run` to `target`
/// 2. Fetches the GRIB file (or reuses the cached one)
/// 3. Loads the total cloud cover field
/// 4. Normalizes longitudes to (-180, 180]
/// 5. Crops to the profile's bounding box
/// 6. Renders the map and writes `{name}-f{lead}.jpg` into `output_dir`
///
/// Returns the path of the written image.
///
/// # Errors
///
/// Any [`ForecastError`](crate::error::ForecastError) raised along the way;
/// no map is written on failure.
pub async fn run_forecast_map<C: ArchiveClient, S: StorageBackend>(
    fetcher: &GridFetcher<C, S>,
    profile: &ProfileConfig,
    run: ModelRun,
    target: DateTime<Utc>,
    output_dir: &Path,
    options: &RenderOptions,
) -> ForecastResult<PathBuf> {
    let (lead, grib_path) = fetch_forecast(fetcher, run, target).await?;

    let dataset = load_total_cloud_cover(&grib_path, run, lead)?;
    let dataset = normalize_longitude(dataset)?;
    let dataset = crop_dataset(dataset, &profile.bounds.to_filters())?;
    show_dataset_summary(&dataset);

    let image = render_map(&dataset, TCC_VARIABLE, profile, options)?;
    info!("{}", map_title(run, lead));
    let jpeg = encode_jpeg(&image, options.quality)?;

    let output = output_dir.join(output_file_name(&profile.name, lead));
    let output_str = output
        .to_str()
        .ok_or_else(|| StorageError::InvalidPath(output.display().to_string()))?;
    LocalStorage.write(output_str, &jpeg).await?;
    info!("Map written to {}", output.display());
    Ok(output)
}
