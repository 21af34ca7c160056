use crate::dataset::{GridDataset, LATITUDE, LONGITUDE};
use crate::error::ForecastResult;
use serde::{Deserialize, Serialize};

/// Indices along one dimension that satisfied a filter
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub dimension: String,
    pub indices: Vec<usize>,
}

impl FilterResult {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub trait GridFilter {
    fn apply(&self, dataset: &GridDataset) -> ForecastResult<FilterResult>;

    fn describe(&self) -> String;
}

/// Keeps coordinate labels within an inclusive range.
///
/// The bounds may be given in either order.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub dimension_name: String,
    pub min_value: f64,
    pub max_value: f64,
}

impl RangeFilter {
    pub fn new(dimension_name: &str, min_value: f64, max_value: f64) -> Self {
        RangeFilter {
            dimension_name: dimension_name.to_string(),
            min_value,
            max_value,
        }
    }

    fn bounds(&self) -> (f64, f64) {
        if self.min_value <= self.max_value {
            (self.min_value, self.max_value)
        } else {
            (self.max_value, self.min_value)
        }
    }
}

impl GridFilter for RangeFilter {
    fn apply(&self, dataset: &GridDataset) -> ForecastResult<FilterResult> {
        let (low, high) = self.bounds();
        let values = dataset.coordinate(&self.dimension_name)?;
        let indices: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, val)| **val >= low && **val <= high)
            .map(|(idx, _)| idx)
            .collect();
        Ok(FilterResult {
            dimension: self.dimension_name.clone(),
            indices,
        })
    }

    fn describe(&self) -> String {
        let (low, high) = self.bounds();
        format!("{} in [{}, {}]", self.dimension_name, low, high)
    }
}

/// Geographic region of interest on the signed longitude convention
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// Latitude and longitude range filters covering the box
    pub fn to_filters(&self) -> Vec<Box<dyn GridFilter>> {
        vec![
            Box::new(RangeFilter::new(LATITUDE, self.lat_min, self.lat_max)),
            Box::new(RangeFilter::new(LONGITUDE, self.lon_min, self.lon_max)),
        ]
    }

    /// West, east, south and north edges with the bounds ordered
    pub fn edges(&self) -> (f64, f64, f64, f64) {
        (
            self.lon_min.min(self.lon_max),
            self.lon_min.max(self.lon_max),
            self.lat_min.min(self.lat_max),
            self.lat_min.max(self.lat_max),
        )
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let (west, east, south, north) = self.edges();
        lon >= west && lon <= east && lat >= south && lat <= north
    }
}
