//! # Profile Configuration
//!
//! Map profiles are read from a JSON (default `config.json`) or YAML file whose
//! top level maps a profile key to its settings:
//!
//! ```json
//! {
//!   "conus": {
//!     "name": "conus",
//!     "lonMin": -105.0, "lonMax": -65.0,
//!     "latMin": 24.0, "latMax": 50.0,
//!     "showCounties": false,
//!     "markers": [{ "lon": -96.8, "lat": 32.8 }],
//!     "boundaries": [{ "path": "states.geojson", "color": "#000000" }]
//!   }
//! }
//! ```
//!
//! The format is chosen from the file extension: `.yaml` / `.yml` are read as
//! YAML, anything else as JSON.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use eclipse_clouds::input::ConfigFile;
//!
//! let config = ConfigFile::from_file("config.json")?;
//! let profile = config.profile("conus")?;
//! println!("Rendering {}", profile.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{ForecastError, ForecastResult};
use crate::filters::BoundingBox;
use crate::normalize::wrap_longitude;
use crate::render::parse_hex_color;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// All profiles of a configuration file, keyed by profile name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFile {
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// Settings of one map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    /// Display name, also the prefix of the output file
    pub name: String,
    /// Region to crop and draw
    #[serde(flatten)]
    pub bounds: BoundingBox,
    /// Draw boundary layers marked `detail`
    pub show_counties: bool,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub boundaries: Vec<BoundaryLayer>,
}

/// Point of interest drawn as a red `+`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub lon: f64,
    pub lat: f64,
}

/// A GeoJSON file of lines or polygons drawn over the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryLayer {
    pub path: String,
    #[serde(default = "default_boundary_color")]
    pub color: String,
    /// Only drawn when the profile shows counties
    #[serde(default)]
    pub detail: bool,
}

fn default_boundary_color() -> String {
    "#000000".to_string()
}

/// Serialization format of a configuration file
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

fn invalid(message: String) -> ForecastError {
    ForecastError::InvalidConfiguration(message)
}

impl ConfigFile {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the file cannot be read or parsed, or when
    /// a profile fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ForecastResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {}", path.display(), e)))?;
        let config = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => Self::from_json(&content)?,
            ConfigFormat::Yaml => Self::from_yaml(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json_str: &str) -> ForecastResult<Self> {
        serde_json::from_str(json_str).map_err(|e| invalid(format!("JSON: {}", e)))
    }

    pub fn from_yaml(yaml_str: &str) -> ForecastResult<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| invalid(format!("YAML: {}", e)))
    }

    pub fn to_json(&self) -> ForecastResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| invalid(format!("JSON: {}", e)))
    }

    pub fn to_yaml(&self) -> ForecastResult<String> {
        serde_yaml::to_string(self).map_err(|e| invalid(format!("YAML: {}", e)))
    }

    pub fn to_format(&self, format: ConfigFormat) -> ForecastResult<String> {
        match format {
            ConfigFormat::Json => self.to_json(),
            ConfigFormat::Yaml => self.to_yaml(),
        }
    }

    /// Looks up a profile by key.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when no profile has that key.
    pub fn profile(&self, key: &str) -> ForecastResult<&ProfileConfig> {
        self.profiles.get(key).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            invalid(format!(
                "no profile '{}' (available: {})",
                key,
                known.join(", ")
            ))
        })
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.profiles.is_empty() {
            return Err(invalid("configuration defines no profiles".to_string()));
        }
        for (key, profile) in &self.profiles {
            profile.validate().map_err(|e| match e {
                ForecastError::InvalidConfiguration(msg) => {
                    invalid(format!("profile '{}': {}", key, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Two ready-to-edit profiles covering the eclipse path
    pub fn sample() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "conus".to_string(),
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
                boundaries: vec![BoundaryLayer {
                    path: "boundaries/states.geojson".to_string(),
                    color: default_boundary_color(),
                    detail: false,
                }],
            },
        );
        profiles.insert(
            "texas".to_string(),
            ProfileConfig {
                name: "texas".to_string(),
                bounds: BoundingBox {
                    lon_min: -101.0,
                    lon_max: -93.0,
                    lat_min: 28.0,
                    lat_max: 34.0,
                },
                show_counties: true,
                markers: vec![Marker {
                    lon: -96.8,
                    lat: 32.78,
                }],
                boundaries: vec![
                    BoundaryLayer {
                        path: "boundaries/eclipse_path.geojson".to_string(),
                        color: "#FF0000".to_string(),
                        detail: false,
                    },
                    BoundaryLayer {
                        path: "boundaries/counties.geojson".to_string(),
                        color: "#808080".to_string(),
                        detail: true,
                    },
                ],
            },
        );
        ConfigFile { profiles }
    }
}

impl ProfileConfig {
    pub fn validate(&self) -> ForecastResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }

        let b = &self.bounds;
        for (label, value) in [
            ("lonMin", b.lon_min),
            ("lonMax", b.lon_max),
            ("latMin", b.lat_min),
            ("latMax", b.lat_max),
        ] {
            if !value.is_finite() {
                return Err(invalid(format!("{} is not a finite number", label)));
            }
        }
        let (west, east, south, north) = b.edges();
        if south < -90.0 || north > 90.0 {
            return Err(invalid(format!("latitudes {}..{} outside [-90, 90]", south, north)));
        }
        // Grids are cropped after normalization, so only signed longitudes match
        if west < -180.0 || east > 180.0 {
            return Err(invalid(format!(
                "longitudes {}..{} outside [-180, 180]; use {}..{}",
                west,
                east,
                wrap_longitude(west),
                wrap_longitude(east)
            )));
        }
        if west == east || south == north {
            return Err(invalid("bounding box has zero area".to_string()));
        }

        if let Some(m) = self
            .markers
            .iter()
            .find(|m| !m.lon.is_finite() || !m.lat.is_finite())
        {
            return Err(invalid(format!("marker ({}, {}) is not finite", m.lon, m.lat)));
        }
        for layer in &self.boundaries {
            parse_hex_color(&layer.color).map_err(|_| {
                invalid(format!(
                    "boundary '{}' colour '{}' is not #RRGGBB",
                    layer.path, layer.color
                ))
            })?;
        }
        Ok(())
    }

    /// Boundary layers drawn for this profile
    pub fn visible_boundaries(&self) -> impl Iterator<Item = &BoundaryLayer> {
        self.boundaries
            .iter()
            .filter(|layer| !layer.detail || self.show_counties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    const CONFIG_JSON: &str = r##"
    {
      "conus": {
        "name": "conus",
        "lonMin": -105.0, "lonMax": -65.0,
        "latMin": 24.0, "latMax": 50.0,
        "showCounties": false
      },
      "dallas": {
        "name": "dallas",
        "lonMin": -98.0, "lonMax": -95.0,
        "latMin": 31.5, "latMax": 34.0,
        "showCounties": true,
        "markers": [{ "lon": -96.8, "lat": 32.78 }],
        "boundaries": [
          { "path": "states.geojson" },
          { "path": "counties.geojson", "color": "#808080", "detail": true }
        ]
      }
    }"##;

    #[test]
    fn test_parse_json_profiles() {
        let config = ConfigFile::from_json(CONFIG_JSON).unwrap();
        config.validate().unwrap();

        let conus = config.profile("conus").unwrap();
        assert_eq!(conus.bounds.lon_min, -105.0);
        assert!(conus.markers.is_empty());
        assert!(conus.boundaries.is_empty());

        let dallas = config.profile("dallas").unwrap();
        assert!(dallas.show_counties);
        assert_eq!(dallas.markers, vec![Marker { lon: -96.8, lat: 32.78 }]);
        assert_eq!(dallas.boundaries[0].color, "#000000");
        assert!(!dallas.boundaries[0].detail);
        assert_eq!(dallas.boundaries[1].color, "#808080");
        assert!(dallas.boundaries[1].detail);
    }

    #[test]
    fn test_missing_profile() {
        let config = ConfigFile::from_json(CONFIG_JSON).unwrap();
        match config.profile("europe") {
            Err(ForecastError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("europe"));
                assert!(msg.contains("conus"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_key() {
        let result = ConfigFile::from_json(r#"{"p": {"name": "p", "lonMin": 0.0}}"#);
        assert!(matches!(result, Err(ForecastError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_validation_rules() {
        let mut profile = ConfigFile::sample().profiles["conus"].clone();
        profile.validate().unwrap();

        profile.bounds.lat_max = 95.0;
        assert!(profile.validate().is_err());

        profile.bounds.lat_max = 50.0;
        profile.bounds.lon_min = f64::NAN;
        assert!(profile.validate().is_err());

        profile.bounds.lon_min = -65.0;
        assert!(profile.validate().is_err(), "zero-width box");

        profile.bounds.lon_min = -105.0;
        profile.bounds.lon_max = 181.0;
        assert!(profile.validate().is_err());

        profile.bounds.lon_max = -65.0;
        profile.boundaries[0].color = "black".to_string();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_visible_boundaries() {
        let config = ConfigFile::from_json(CONFIG_JSON).unwrap();
        let mut dallas = config.profile("dallas").unwrap().clone();
        assert_eq!(dallas.visible_boundaries().count(), 2);
        dallas.show_counties = false;
        let paths: Vec<&str> = dallas.visible_boundaries().map(|b| b.path.as_str()).collect();
        assert_eq!(paths, vec!["states.geojson"]);
    }

    #[test]
    fn test_yaml_file_and_sample_round_trip() {
        let sample = ConfigFile::sample();
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(sample.to_yaml().unwrap().as_bytes()).unwrap();

        let loaded = ConfigFile::from_file(file.path()).unwrap();
        assert_eq!(loaded, sample);
        assert_eq!(ConfigFile::from_json(&sample.to_json().unwrap()).unwrap(), sample);
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YAML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }

    #[test]
    fn test_unreadable_file() {
        let result = ConfigFile::from_file("/nonexistent/config.json");
        assert!(matches!(result, Err(ForecastError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unsigned_longitudes_rejected() {
        let json = r#"{"east": {"name": "east", "lonMin": 255.0, "lonMax": 295.0, "latMin": 24.0, "latMax": 50.0}}"#;
        match ConfigFile::from_json(json).and_then(|config| config.validate()) {
            Err(ForecastError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("[-180, 180]"));
                assert!(msg.contains("-105..-65"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
