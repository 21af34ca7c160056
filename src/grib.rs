//! # GRIB2 Loading
//!
//! Reads a cached GFS file with the `grib` crate and turns the total cloud
//! cover field into a [`GridDataset`].
//!
//! The GFS 0.25° file holds several hundred submessages. The one wanted is
//! identified by its product definition:
//!
//! | Field                  | Value | Meaning                          |
//! |------------------------|-------|----------------------------------|
//! | discipline             | 0     | meteorological products          |
//! | parameter category     | 6     | cloud                            |
//! | parameter number       | 1     | total cloud cover (%)            |
//! | first fixed surface    | 10    | entire atmosphere                |
//! | product template       | 4.8   | average over a time interval     |
//!
//! GFS grids scan west to east along a row, north to south across rows, so
//! the first `ni` grid points carry the longitude axis and every `ni`-th
//! point carries the latitude axis.

use crate::dataset::{DataVariable, Dimension, GridDataset, LATITUDE, LONGITUDE, STEP, TIME};
use crate::error::{ForecastError, ForecastResult};
use crate::time::{ForecastLeadHours, ModelRun};
use log::{debug, info};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Name of the cloud cover variable in the loaded dataset
pub const TCC_VARIABLE: &str = "tcc";

/// Identifying fields of one GRIB2 submessage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageKey {
    pub discipline: u8,
    pub category: Option<u8>,
    pub number: Option<u8>,
    pub surface_type: Option<u8>,
    pub template: u16,
}

/// Total cloud cover, entire atmosphere, time average
pub const TOTAL_CLOUD_COVER: MessageKey = MessageKey {
    discipline: 0,
    category: Some(6),
    number: Some(1),
    surface_type: Some(10),
    template: 8,
};

impl MessageKey {
    pub fn of<R>(submessage: &grib::SubMessage<'_, R>) -> Self {
        let prod_def = submessage.prod_def();
        MessageKey {
            discipline: submessage.indicator().discipline,
            category: prod_def.parameter_category(),
            number: prod_def.parameter_number(),
            surface_type: prod_def
                .fixed_surfaces()
                .map(|(first, _)| first.surface_type),
            template: prod_def.prod_tmpl_num(),
        }
    }

    pub fn is_total_cloud_cover(&self) -> bool {
        *self == TOTAL_CLOUD_COVER
    }
}

fn grib_error(e: impl std::fmt::Display) -> ForecastError {
    ForecastError::Grib(e.to_string())
}

/// Loads the total cloud cover field of a cached GFS file.
///
/// The file does not record the run in a form the reader exposes, so the
/// caller passes the run and lead the file was fetched for; they label the
/// `time` and `step` dimensions.
///
/// # Errors
///
/// - `Io` when the file cannot be opened
/// - `Grib` when the file is not valid GRIB2 or the field cannot be decoded
/// - `MissingVariable` when no submessage is total cloud cover
pub fn load_total_cloud_cover(
    path: &Path,
    run: ModelRun,
    lead: ForecastLeadHours,
) -> ForecastResult<GridDataset> {
    info!("Reading {}", path.display());
    let file = File::open(path)?;
    let grib2 = grib::from_reader(BufReader::new(file)).map_err(grib_error)?;

    for (index, submessage) in grib2.iter() {
        let key = MessageKey::of(&submessage);
        if !key.is_total_cloud_cover() {
            continue;
        }
        debug!("Total cloud cover found in submessage {:?}", index);

        let (ni, nj) = submessage.grid_shape().map_err(grib_error)?;
        let latlons: Vec<(f32, f32)> = submessage.latlons().map_err(grib_error)?.collect();
        let decoder = grib::Grib2SubmessageDecoder::from(submessage).map_err(grib_error)?;
        let values: Vec<f32> = decoder.dispatch().map_err(grib_error)?.collect();

        return build_dataset(&latlons, values, ni, nj, run, lead);
    }

    Err(ForecastError::MissingVariable(format!(
        "{} (total cloud cover, entire atmosphere) not found in {}",
        TCC_VARIABLE,
        path.display()
    )))
}

/// Rounds a decoded coordinate to 1e-4 degrees.
///
/// Grid point coordinates come back as `f32`, so 0.25 reads as 0.25000003.
fn round_coordinate(value: f32) -> f64 {
    ((value as f64) * 1e4).round() / 1e4
}

/// Assembles the dataset from decoded grid points and values.
///
/// `latlons` and `values` are in scan order, `ni` points per row and `nj`
/// rows.
pub fn build_dataset(
    latlons: &[(f32, f32)],
    values: Vec<f32>,
    ni: usize,
    nj: usize,
    run: ModelRun,
    lead: ForecastLeadHours,
) -> ForecastResult<GridDataset> {
    let points = ni * nj;
    if points == 0 || latlons.len() != points || values.len() != points {
        return Err(ForecastError::ShapeMismatch(format!(
            "grid of {} x {} with {} coordinates and {} values",
            ni,
            nj,
            latlons.len(),
            values.len()
        )));
    }

    let longitudes: Vec<f64> = latlons[..ni]
        .iter()
        .map(|&(_, lon)| round_coordinate(lon))
        .collect();
    let latitudes: Vec<f64> = latlons
        .iter()
        .step_by(ni)
        .map(|&(lat, _)| round_coordinate(lat))
        .collect();

    let mut dataset = GridDataset::new();
    dataset.add_dimension(
        Dimension::new(TIME, vec![run.instant().timestamp() as f64])
            .with_units("seconds since 1970-01-01"),
    );
    dataset.add_dimension(Dimension::new(STEP, vec![lead.hours() as f64]).with_units("hours"));
    dataset.add_dimension(Dimension::new(LATITUDE, latitudes).with_units("degrees_north"));
    dataset.add_dimension(Dimension::new(LONGITUDE, longitudes).with_units("degrees_east"));
    dataset.add_variable(
        DataVariable::new(TCC_VARIABLE, &[TIME, STEP, LATITUDE, LONGITUDE], values)
            .with_units("%")
            .with_long_name("Total Cloud Cover"),
    )?;
    dataset.set_attribute("model_run", &run.to_string());
    dataset.set_attribute("forecast_hour", &lead.to_string());
    dataset.set_attribute("source", "GFS 0.25 degree");

    debug!("Loaded {} x {} grid", ni, nj);
    Ok(dataset)
}
