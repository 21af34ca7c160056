//! # Gridded Dataset
//!
//! A small, library-neutral stand-in for a labelled array collection:
//!
//! - **Dimensions**: ordered, named axes, each carrying a coordinate array
//!   (one `f64` label per index along the axis)
//! - **Variables**: named `f32` arrays laid out row-major over a subset of the
//!   dimensions, in the order listed in [`DataVariable::dims`]
//! - **Attributes**: free-form string metadata
//!
//! Dimensions double as coordinates, so a dimension is addressed by the
//! same name before and after any relabelling. Index selection along an
//! axis ([`GridDataset::select`]) is the one primitive the normalizer and
//! the cropping code are built on; it moves coordinate labels and data
//! slices together so each value stays attached to its labels.

use crate::error::{ForecastError, ForecastResult};
use std::collections::BTreeMap;

/// Name of the longitude dimension
pub const LONGITUDE: &str = "longitude";
/// Name of the latitude dimension
pub const LATITUDE: &str = "latitude";
/// Name of the forecast step dimension (hours)
pub const STEP: &str = "step";
/// Name of the model run dimension (Unix seconds)
pub const TIME: &str = "time";

/// A named axis with one coordinate label per index
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub values: Vec<f64>,
    pub units: Option<String>,
}

impl Dimension {
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Dimension {
            name: name.to_string(),
            values,
            units: None,
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named data array over some of the dataset's dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct DataVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub values: Vec<f32>,
    pub units: Option<String>,
    pub long_name: Option<String>,
}

impl DataVariable {
    pub fn new(name: &str, dims: &[&str], values: Vec<f32>) -> Self {
        DataVariable {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            values,
            units: None,
            long_name: None,
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn with_long_name(mut self, long_name: &str) -> Self {
        self.long_name = Some(long_name.to_string());
        self
    }
}

/// Collection of dimensions and the variables laid out over them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridDataset {
    dimensions: Vec<Dimension>,
    variables: Vec<DataVariable>,
    attributes: BTreeMap<String, String>,
}

impl GridDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dimension, replacing any previous one with the same name.
    pub fn add_dimension(&mut self, dimension: Dimension) {
        if let Some(existing) = self.dimensions.iter_mut().find(|d| d.name == dimension.name) {
            *existing = dimension;
        } else {
            self.dimensions.push(dimension);
        }
    }

    /// Adds a variable after checking it against the declared dimensions.
    ///
    /// # Errors
    ///
    /// `MissingCoordinate` when the variable references an unknown dimension,
    /// `ShapeMismatch` when its value count disagrees with the dimension sizes.
    pub fn add_variable(&mut self, variable: DataVariable) -> ForecastResult<()> {
        let shape = self.shape_of(&variable.dims)?;
        let expected: usize = shape.iter().product();
        if expected != variable.values.len() {
            return Err(ForecastError::ShapeMismatch(format!(
                "variable '{}' has {} values but dimensions {:?} hold {}",
                variable.name,
                variable.values.len(),
                variable.dims,
                expected
            )));
        }
        self.variables.retain(|v| v.name != variable.name);
        self.variables.push(variable);
        Ok(())
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn variables(&self) -> &[DataVariable] {
        &self.variables
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn dimension_mut(&mut self, name: &str) -> Option<&mut Dimension> {
        self.dimensions.iter_mut().find(|d| d.name == name)
    }

    /// Coordinate labels of a dimension
    pub fn coordinate(&self, name: &str) -> ForecastResult<&[f64]> {
        self.dimension(name)
            .map(|d| d.values.as_slice())
            .ok_or_else(|| ForecastError::MissingCoordinate(name.to_string()))
    }

    pub fn variable(&self, name: &str) -> ForecastResult<&DataVariable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ForecastError::MissingVariable(name.to_string()))
    }

    /// Sizes of the given dimensions, in the order given
    pub fn shape_of(&self, dims: &[String]) -> ForecastResult<Vec<usize>> {
        dims.iter()
            .map(|name| {
                self.dimension(name)
                    .map(Dimension::len)
                    .ok_or_else(|| ForecastError::MissingCoordinate(name.clone()))
            })
            .collect()
    }

    /// Keeps only `indices` along dimension `name`, in the order given.
    ///
    /// Coordinate labels and every variable laid out over `name` are
    /// gathered with the same index list, so a value keeps the labels it
    /// had before selection. Indices may reorder or repeat positions.
    ///
    /// # Errors
    ///
    /// `MissingCoordinate` when `name` is not a dimension; `ShapeMismatch`
    /// when an index is out of range.
    pub fn select(mut self, name: &str, indices: &[usize]) -> ForecastResult<Self> {
        let len = self
            .dimension(name)
            .map(Dimension::len)
            .ok_or_else(|| ForecastError::MissingCoordinate(name.to_string()))?;
        if let Some(bad) = indices.iter().find(|&&i| i >= len) {
            return Err(ForecastError::ShapeMismatch(format!(
                "index {} out of range for dimension '{}' of length {}",
                bad, name, len
            )));
        }

        let mut variables = std::mem::take(&mut self.variables);
        for variable in &mut variables {
            let Some(axis) = variable.dims.iter().position(|d| d == name) else {
                continue;
            };
            let shape = self.shape_of(&variable.dims)?;
            variable.values = gather_axis(&variable.values, &shape, axis, indices);
        }
        self.variables = variables;

        if let Some(dimension) = self.dimension_mut(name) {
            dimension.values = indices.iter().map(|&i| dimension.values[i]).collect();
        }
        Ok(self)
    }
}

/// Gathers `indices` along `axis` of a row-major array with `shape`.
fn gather_axis(values: &[f32], shape: &[usize], axis: usize, indices: &[usize]) -> Vec<f32> {
    let outer: usize = shape[..axis].iter().product();
    let axis_len = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();

    let mut out = Vec::with_capacity(outer * indices.len() * inner);
    for o in 0..outer {
        let base = o * axis_len * inner;
        for &i in indices {
            let start = base + i * inner;
            out.extend_from_slice(&values[start..start + inner]);
        }
    }
    out
}
