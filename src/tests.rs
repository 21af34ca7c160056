use crate::archive::mock::MockArchive;
use crate::archive::{GridFetcher, cache_file_name};
use crate::dataset::{GridDataset, LATITUDE, LONGITUDE};
use crate::error::ForecastError;
use crate::extract::crop_dataset;
use crate::filters::BoundingBox;
use crate::grib::{TCC_VARIABLE, build_dataset};
use crate::input::{ConfigFile, ProfileConfig};
use crate::normalize::normalize_longitude;
use crate::render::{
    LEVELS, MapProjection, PALETTE, RenderOptions, encode_jpeg, level_class, parse_hex_color,
    render_map,
};
use crate::time::{ECLIPSE_TARGET, ForecastLeadHours, ModelRun, parse_model_run, parse_target};
use crate::{fetch_forecast, run_forecast_map};
use chrono::{DateTime, Utc};
use std::path::Path;
use tempfile::tempdir;

const ARCHIVE: &str = "http://archive.test/gfs/prod";

fn eclipse() -> DateTime<Utc> {
    parse_target(ECLIPSE_TARGET).unwrap()
}

fn april_first() -> ModelRun {
    parse_model_run("20240401T0000").unwrap()
}

fn conus() -> ProfileConfig {
    ProfileConfig {
        name: "conus".to_string(),
        bounds: BoundingBox {
            lon_min: -105.0,
            lon_max: -65.0,
            lat_min: 24.0,
            lat_max: 50.0,
        },
        show_counties: false,
        markers: vec![],
        boundaries: vec![],
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect()
}

/// One degree grid on the archive's [0, 360) convention, 60N to 10N.
///
/// Cloud cover is 80 % east of 270E (90W) and 20 % elsewhere, so the
/// values can be traced through normalization.
fn one_degree_grid(run: ModelRun, lead: ForecastLeadHours) -> GridDataset {
    let (ni, nj) = (360, 51);
    let mut latlons = Vec::with_capacity(ni * nj);
    let mut values = Vec::with_capacity(ni * nj);
    for j in 0..nj {
        for i in 0..ni {
            let lon = i as f32;
            latlons.push((60.0 - j as f32, lon));
            values.push(if lon >= 270.0 { 80.0 } else { 20.0 });
        }
    }
    build_dataset(&latlons, values, ni, nj, run, lead).unwrap()
}

#[cfg(test)]
mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn test_unpublished_forecast_is_reported_and_retried() {
        let cache = tempdir().unwrap();
        let output = tempdir().unwrap();
        let archive = MockArchive::new(404, b"");
        let fetcher = GridFetcher::new(&archive, cache.path(), ARCHIVE);

        let result = run_forecast_map(
            &fetcher,
            &conus(),
            april_first(),
            eclipse(),
            output.path(),
            &RenderOptions::default(),
        )
        .await;

        match result {
            Err(ForecastError::DataNotReady { url, status }) => {
                assert_eq!(status, 404);
                assert!(url.ends_with("gfs.20240401/00/atmos/gfs.t00z.pgrb2.0p25.f168"));
            }
            other => panic!("Expected DataNotReady, got {:?}", other),
        }
        assert!(files_in(cache.path()).is_empty());
        assert!(files_in(output.path()).is_empty());

        // Nothing was cached, so the next attempt asks the archive again
        let again = fetch_forecast(&fetcher, april_first(), eclipse()).await;
        assert!(matches!(again, Err(ForecastError::DataNotReady { .. })));
        assert_eq!(archive.request_count(), 2);
    }

    #[tokio::test]
    async fn test_download_lands_under_cache_name() {
        let cache = tempdir().unwrap();
        let archive = MockArchive::new(200, b"GRIB payload");
        let fetcher = GridFetcher::new(&archive, cache.path(), ARCHIVE);

        let (lead, path) = fetch_forecast(&fetcher, april_first(), eclipse())
            .await
            .unwrap();

        assert_eq!(lead.hours(), 168);
        assert_eq!(path, cache.path().join("2024040100168.grib"));
        assert_eq!(std::fs::read(&path).unwrap(), b"GRIB payload");
        assert_eq!(files_in(cache.path()), vec!["2024040100168.grib".to_string()]);

        let urls = archive.urls.lock().unwrap();
        assert_eq!(
            urls.as_slice(),
            [format!(
                "{}/gfs.20240401/00/atmos/gfs.t00z.pgrb2.0p25.f168",
                ARCHIVE
            )]
        );
    }

    #[test]
    fn test_cached_file_is_reused() {
        let cache = tempdir().unwrap();
        let run = parse_model_run("20240405T1800").unwrap();
        let lead = ForecastLeadHours::new(72);
        let cached = cache.path().join(cache_file_name(run, lead));
        std::fs::write(&cached, b"previous download").unwrap();

        let archive = MockArchive::new(500, b"");
        let fetcher = GridFetcher::new(&archive, cache.path(), ARCHIVE);
        let (resolved, path) =
            tokio_test::block_on(fetch_forecast(&fetcher, run, eclipse())).unwrap();

        assert_eq!(resolved, lead);
        assert_eq!(path, cached);
        assert_eq!(archive.request_count(), 0);
        assert_eq!(std::fs::read(&path).unwrap(), b"previous download");
    }

    #[tokio::test]
    async fn test_target_before_run_makes_no_request() {
        let cache = tempdir().unwrap();
        let archive = MockArchive::new(200, b"GRIB");
        let fetcher = GridFetcher::new(&archive, cache.path(), ARCHIVE);
        let late_run = parse_model_run("20240409T0000").unwrap();

        let result = fetch_forecast(&fetcher, late_run, eclipse()).await;
        assert!(matches!(result, Err(ForecastError::TargetBeforeRun { .. })));
        assert_eq!(archive.request_count(), 0);
        assert!(files_in(cache.path()).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cached_file_writes_no_map() {
        let cache = tempdir().unwrap();
        let output = tempdir().unwrap();
        let lead = ForecastLeadHours::new(168);
        std::fs::write(
            cache.path().join(cache_file_name(april_first(), lead)),
            b"<html>truncated</html>",
        )
        .unwrap();

        let archive = MockArchive::new(200, b"");
        let fetcher = GridFetcher::new(&archive, cache.path(), ARCHIVE);
        let result = run_forecast_map(
            &fetcher,
            &conus(),
            april_first(),
            eclipse(),
            output.path(),
            &RenderOptions::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(ForecastError::Grib(_)) | Err(ForecastError::MissingVariable(_))
        ));
        assert_eq!(archive.request_count(), 0);
        assert!(files_in(output.path()).is_empty());
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    #[test]
    fn test_normalize_then_crop_keeps_values_under_labels() {
        let lead = ForecastLeadHours::new(168);
        let dataset = normalize_longitude(one_degree_grid(april_first(), lead)).unwrap();
        let lons = dataset.coordinate(LONGITUDE).unwrap();
        assert_eq!(lons.first(), Some(&-179.0));
        assert_eq!(lons.last(), Some(&180.0));

        let cropped = crop_dataset(dataset, &conus().bounds.to_filters()).unwrap();
        let lons = cropped.coordinate(LONGITUDE).unwrap().to_vec();
        let lats = cropped.coordinate(LATITUDE).unwrap().to_vec();
        assert_eq!(lons.len(), 41);
        assert_eq!(lons.first(), Some(&-105.0));
        assert_eq!(lons.last(), Some(&-65.0));
        assert_eq!(lats.len(), 27);
        assert_eq!(lats.first(), Some(&50.0));
        assert_eq!(lats.last(), Some(&24.0));

        let tcc = cropped.variable(TCC_VARIABLE).unwrap();
        assert_eq!(tcc.values.len(), 41 * 27);
        for (j, _) in lats.iter().enumerate() {
            for (i, lon) in lons.iter().enumerate() {
                let expected = if *lon >= -90.0 { 80.0 } else { 20.0 };
                assert_eq!(tcc.values[j * lons.len() + i], expected, "at lon {}", lon);
            }
        }
    }

    #[test]
    fn test_crop_outside_grid_is_empty_selection() {
        let lead = ForecastLeadHours::new(0);
        let dataset = normalize_longitude(one_degree_grid(april_first(), lead)).unwrap();
        let southern = BoundingBox {
            lon_min: -60.0,
            lon_max: -40.0,
            lat_min: -40.0,
            lat_max: -20.0,
        };
        let result = crop_dataset(dataset, &southern.to_filters());
        assert!(matches!(result, Err(ForecastError::EmptySelection(_))));
    }

    #[test]
    fn test_rendered_map_shows_cloud_classes() {
        let lead = ForecastLeadHours::new(168);
        let profile = conus();
        let dataset = normalize_longitude(one_degree_grid(april_first(), lead)).unwrap();
        let dataset = crop_dataset(dataset, &profile.bounds.to_filters()).unwrap();

        let options = RenderOptions {
            width: 400,
            ..RenderOptions::default()
        };
        let map = render_map(&dataset, TCC_VARIABLE, &profile, &options).unwrap();
        let projection = MapProjection::new(&profile.bounds, options.width).unwrap();
        assert_eq!(map.width(), 400);
        assert!(map.height() > projection.height());

        let color_of = |value: f32| parse_hex_color(PALETTE[level_class(value).unwrap()]).unwrap();
        let pixel_at = |lon: f64, lat: f64| {
            let (x, y) = projection.project(lon, lat);
            *map.get_pixel(x.round() as u32, y.round() as u32)
        };
        assert_eq!(pixel_at(-100.0, 37.0), color_of(20.0));
        assert_eq!(pixel_at(-70.0, 37.0), color_of(80.0));
        assert_ne!(color_of(20.0), color_of(80.0));

        let jpeg = encode_jpeg(&map, options.quality).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_palette_covers_every_class() {
        assert_eq!(PALETTE.len(), LEVELS.len() - 1);
        for value in [0.0, 4.9, 50.0, 99.9, 100.0, 105.0] {
            let class = level_class(value).unwrap();
            assert!(parse_hex_color(PALETTE[class]).is_ok());
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_sample_profiles_survive_yaml() {
        let yaml = ConfigFile::sample().to_yaml().unwrap();
        let config = ConfigFile::from_yaml(&yaml).unwrap();

        let texas = config.profile("texas").unwrap();
        assert!(texas.show_counties);
        assert_eq!(texas.markers.len(), 1);
        assert_eq!(texas.visible_boundaries().count(), 2);

        let conus = config.profile("conus").unwrap();
        assert_eq!(conus.visible_boundaries().count(), 1);
    }

    #[test]
    fn test_unknown_profile_lists_choices() {
        let config = ConfigFile::sample();
        let err = config.profile("alaska").unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfiguration(_)));
        let message = err.to_string();
        assert!(message.contains("conus"));
        assert!(message.contains("texas"));
    }

    /// Missing boundary files are skipped, so a sample profile renders as is
    #[test]
    fn test_sample_profile_renders_without_boundary_files() {
        let config = ConfigFile::sample();
        let texas = config.profile("texas").unwrap();
        let lead = ForecastLeadHours::new(24);
        let dataset = normalize_longitude(one_degree_grid(april_first(), lead)).unwrap();
        let dataset = crop_dataset(dataset, &texas.bounds.to_filters()).unwrap();

        let options = RenderOptions {
            width: 200,
            ..RenderOptions::default()
        };
        let map = render_map(&dataset, TCC_VARIABLE, texas, &options).unwrap();
        assert_eq!(map.width(), 200);
    }
}
