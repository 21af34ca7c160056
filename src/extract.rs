//! # Region Extraction
//!
//! Crops a [`GridDataset`] to the coordinates that pass every filter.
//!
//! ## Key Components
//!
//! - [`DimensionIndexManager`]: tracks the surviving indices per dimension and
//!   intersects the results of successive filters
//! - [`crop_dataset`]: applies the filters and keeps the surviving indices

use crate::dataset::GridDataset;
use crate::error::{ForecastError, ForecastResult};
use crate::filters::{FilterResult, GridFilter};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Surviving indices of each dimension while filters are applied.
///
/// Filters on the same dimension intersect. Dimensions no filter touched
/// keep every index.
#[derive(Debug, Clone)]
pub struct DimensionIndexManager {
    dimension_indices: HashMap<String, BTreeSet<usize>>,
    dimension_order: Vec<String>,
    filtered: BTreeSet<String>,
}

impl DimensionIndexManager {
    pub fn new(dataset: &GridDataset) -> Self {
        let mut dimension_indices = HashMap::new();
        let mut dimension_order = Vec::new();

        for dim in dataset.dimensions() {
            let indices: BTreeSet<usize> = (0..dim.len()).collect();
            dimension_indices.insert(dim.name.clone(), indices);
            dimension_order.push(dim.name.clone());
        }

        DimensionIndexManager {
            dimension_indices,
            dimension_order,
            filtered: BTreeSet::new(),
        }
    }

    pub fn apply_filter_result(&mut self, result: &FilterResult) -> ForecastResult<()> {
        let current = self
            .dimension_indices
            .get_mut(&result.dimension)
            .ok_or_else(|| ForecastError::MissingCoordinate(result.dimension.clone()))?;
        let new_indices: BTreeSet<usize> = result.indices.iter().copied().collect();
        *current = current.intersection(&new_indices).copied().collect();
        self.filtered.insert(result.dimension.clone());
        Ok(())
    }

    /// Ascending surviving indices of a dimension
    pub fn get_dimension_indices(&self, dim_name: &str) -> Option<Vec<usize>> {
        self.dimension_indices
            .get(dim_name)
            .map(|set| set.iter().copied().collect())
    }

    /// Keeps the surviving indices of every filtered dimension.
    ///
    /// # Errors
    ///
    /// `EmptySelection` when a filtered dimension has no index left.
    pub fn extract(&self, mut dataset: GridDataset) -> ForecastResult<GridDataset> {
        for dim_name in &self.dimension_order {
            if !self.filtered.contains(dim_name) {
                continue;
            }
            let indices = self.get_dimension_indices(dim_name).unwrap_or_default();
            if indices.is_empty() {
                return Err(ForecastError::EmptySelection(format!(
                    "no '{}' coordinates inside the requested region",
                    dim_name
                )));
            }
            debug!("Keeping {} indices of '{}'", indices.len(), dim_name);
            dataset = dataset.select(dim_name, &indices)?;
        }
        Ok(dataset)
    }
}

/// Crops `dataset` to the coordinates that pass all `filters`.
pub fn crop_dataset(
    dataset: GridDataset,
    filters: &[Box<dyn GridFilter>],
) -> ForecastResult<GridDataset> {
    let mut dim_manager = DimensionIndexManager::new(&dataset);
    for filter in filters {
        let result = filter.apply(&dataset)?;
        debug!("Filter {} matched {} indices", filter.describe(), result.len());
        dim_manager.apply_filter_result(&result)?;
    }
    dim_manager.extract(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataVariable, Dimension, LATITUDE, LONGITUDE};
    use crate::filters::{BoundingBox, RangeFilter};

    /// 3 latitudes (descending) x 4 longitudes, value = 10 * j + i
    fn grid() -> GridDataset {
        let mut ds = GridDataset::new();
        ds.add_dimension(Dimension::new(LATITUDE, vec![50.0, 35.0, 20.0]));
        ds.add_dimension(Dimension::new(LONGITUDE, vec![-120.0, -100.0, -80.0, -60.0]));
        let values: Vec<f32> = (0..3)
            .flat_map(|j| (0..4).map(move |i| (10 * j + i) as f32))
            .collect();
        ds.add_variable(DataVariable::new("tcc", &[LATITUDE, LONGITUDE], values))
            .unwrap();
        ds
    }

    #[test]
    fn test_crop_to_bounding_box() {
        let bbox = BoundingBox {
            lon_min: -105.0,
            lon_max: -65.0,
            lat_min: 24.0,
            lat_max: 50.0,
        };
        let ds = crop_dataset(grid(), &bbox.to_filters()).unwrap();
        assert_eq!(ds.coordinate(LATITUDE).unwrap(), &[50.0, 35.0]);
        assert_eq!(ds.coordinate(LONGITUDE).unwrap(), &[-100.0, -80.0]);
        assert_eq!(ds.variable("tcc").unwrap().values, vec![1.0, 2.0, 11.0, 12.0]);
    }

    #[test]
    fn test_filters_on_same_dimension_intersect() {
        let filters: Vec<Box<dyn GridFilter>> = vec![
            Box::new(RangeFilter::new(LONGITUDE, -130.0, -70.0)),
            Box::new(RangeFilter::new(LONGITUDE, -90.0, -50.0)),
        ];
        let ds = crop_dataset(grid(), &filters).unwrap();
        assert_eq!(ds.coordinate(LONGITUDE).unwrap(), &[-80.0]);
        // Latitude untouched
        assert_eq!(ds.coordinate(LATITUDE).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_region() {
        let filters: Vec<Box<dyn GridFilter>> =
            vec![Box::new(RangeFilter::new(LATITUDE, 60.0, 70.0))];
        let result = crop_dataset(grid(), &filters);
        assert!(matches!(result, Err(ForecastError::EmptySelection(_))));
    }

    #[test]
    fn test_manager_unknown_dimension() {
        let mut manager = DimensionIndexManager::new(&grid());
        let result = manager.apply_filter_result(&FilterResult {
            dimension: "level".to_string(),
            indices: vec![0],
        });
        assert!(matches!(result, Err(ForecastError::MissingCoordinate(_))));
        assert_eq!(manager.get_dimension_indices(LATITUDE), Some(vec![0, 1, 2]));
        assert_eq!(manager.get_dimension_indices("level"), None);
    }
}
