//! # Coordinate Normalizer
//!
//! GFS grids label longitude on [0°, 360°); cropping and plotting work on
//! (−180°, 180°]. [`normalize_longitude`] relabels every longitude above 180°
//! as `v - 360` and then re-sorts the longitude axis ascending, carrying each
//! data column along with its label.
//!
//! Before: `0, 90, 180, 270`  →  relabelled: `0, 90, 180, -90`  →  sorted:
//! `-90, 0, 90, 180`, where the `-90` column is the data that sat under 270.

use crate::dataset::{GridDataset, LONGITUDE};
use crate::error::ForecastResult;
use log::debug;

/// Maps a longitude from [0, 360) onto (−180, 180].
pub fn wrap_longitude(value: f64) -> f64 {
    if value > 180.0 { value - 360.0 } else { value }
}

/// Re-expresses the `longitude` dimension on the signed convention.
///
/// Takes the dataset by value and returns it with longitude sorted
/// ascending. Data values are untouched; only their position along the
/// longitude axis changes, together with their label. Other dimensions and
/// variables are unchanged, and the dimension keeps the name `longitude`.
///
/// Calling it again on its own output is a no-op, since no label above 180
/// remains.
///
/// # Errors
///
/// `MissingCoordinate` when the dataset has no `longitude` dimension.
pub fn normalize_longitude(dataset: GridDataset) -> ForecastResult<GridDataset> {
    normalize_longitude_named(dataset, LONGITUDE)
}

/// [`normalize_longitude`] for a longitude dimension with another name.
pub fn normalize_longitude_named(mut dataset: GridDataset, name: &str) -> ForecastResult<GridDataset> {
    let wrapped: Vec<f64> = dataset
        .coordinate(name)?
        .iter()
        .map(|&v| wrap_longitude(v))
        .collect();

    // Stable sort so equal labels keep their original relative order
    let mut order: Vec<usize> = (0..wrapped.len()).collect();
    order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));

    if let Some(dimension) = dataset.dimension_mut(name) {
        dimension.values = wrapped;
    }
    debug!(
        "Normalized {} '{}' labels; {} moved",
        order.len(),
        name,
        order.iter().enumerate().filter(|(pos, idx)| pos != *idx).count()
    );
    dataset.select(name, &order)
}
