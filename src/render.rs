//! # Map Rendering
//!
//! Draws a cropped cloud cover field as a filled Mercator map:
//!
//! 1. Each pixel row and column is unprojected to a latitude / longitude and
//!    snapped to the nearest grid point (within half a grid step)
//! 2. The value is binned into 5 % classes and painted from [`PALETTE`]
//! 3. GeoJSON boundary layers are stroked on top, then the profile markers
//!    as red `+` symbols
//! 4. A colour bar with one box per class runs along the bottom
//!
//! Output is JPEG, named `{name}-f{lead}.jpg`.

use crate::dataset::{GridDataset, LATITUDE, LONGITUDE};
use crate::error::{ForecastError, ForecastResult};
use crate::filters::BoundingBox;
use crate::input::ProfileConfig;
use crate::time::{ForecastLeadHours, ModelRun};
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use log::{debug, info, warn};
use serde_json::Value;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Class edges in percent; class `k` covers `[LEVELS[k], LEVELS[k + 1])`
pub const LEVELS: [f32; 22] = [
    0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0,
    80.0, 85.0, 90.0, 95.0, 100.0, 105.0,
];

/// Clear sky white through greys to deep blue for overcast
pub const PALETTE: [&str; 21] = [
    "#FFFFFF", "#F3F3F1", "#E7E6E4", "#DBDAD6", "#CBCAC6", "#B7B6B5", "#A2A1A3", "#7E7D82",
    "#747780", "#555D6A", "#3F4B5D", "#2B425D", "#1D4670", "#0E4983", "#004D96", "#1062A9",
    "#2177BB", "#318CCE", "#4CA2DC", "#72B8E7", "#98CEF2",
];

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const MARKER_ARM: f32 = 4.0;
const COLORBAR_HEIGHT: u32 = 20;
const COLORBAR_MARGIN: u32 = 10;
const MAX_LATITUDE: f64 = 85.0;
const MAX_HEIGHT: u32 = 8000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Width of the map in pixels; the height follows from the projection
    pub width: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 1600,
            quality: 90,
        }
    }
}

/// Parses `#RRGGBB`.
pub fn parse_hex_color(hex: &str) -> ForecastResult<Rgb<u8>> {
    let digits = hex.trim_start_matches('#');
    let invalid = || ForecastError::InvalidConfiguration(format!("'{}' is not a #RRGGBB colour", hex));
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

/// Class of a cloud cover value; `None` for missing or out of range values.
///
/// The top edge (105) belongs to the last class.
pub fn level_class(value: f32) -> Option<usize> {
    let last = LEVELS.len() - 1;
    if value.is_nan() || value < LEVELS[0] || value > LEVELS[last] {
        return None;
    }
    let class = LEVELS[1..].iter().position(|&edge| value < edge);
    Some(class.unwrap_or(last - 1))
}

fn class_color(class: usize) -> Rgb<u8> {
    PALETTE
        .get(class)
        .and_then(|hex| parse_hex_color(hex).ok())
        .unwrap_or(BACKGROUND)
}

/// Name of the rendered file for a profile and lead
pub fn output_file_name(name: &str, lead: ForecastLeadHours) -> String {
    format!("{}-f{}.jpg", name, lead)
}

pub fn map_title(run: ModelRun, lead: ForecastLeadHours) -> String {
    format!("F{} -- Initialized {} UTC", lead, run)
}

fn mercator_y(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians().tan().asinh()
}

fn inverse_mercator_y(merc_y: f64) -> f64 {
    merc_y.sinh().atan().to_degrees()
}

/// Pixel mapping of a bounding box under the Mercator projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapProjection {
    west: f64,
    east: f64,
    y_south: f64,
    y_north: f64,
    width: u32,
    height: u32,
}

impl MapProjection {
    pub fn new(bounds: &BoundingBox, width: u32) -> ForecastResult<Self> {
        let (west, east, south, north) = bounds.edges();
        let y_south = mercator_y(south);
        let y_north = mercator_y(north);
        let x_span = (east - west).to_radians();
        if width == 0 || x_span <= 0.0 || y_north <= y_south {
            return Err(ForecastError::Render(format!(
                "cannot project a {} px map of {:?}",
                width, bounds
            )));
        }
        let height = ((width as f64) * (y_north - y_south) / x_span)
            .round()
            .clamp(1.0, MAX_HEIGHT as f64) as u32;
        Ok(MapProjection {
            west,
            east,
            y_south,
            y_north,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel position of a point; may fall outside the map
    pub fn project(&self, lon: f64, lat: f64) -> (f32, f32) {
        let x = (lon - self.west) / (self.east - self.west) * self.width as f64;
        let y = (self.y_north - mercator_y(lat)) / (self.y_north - self.y_south) * self.height as f64;
        (x as f32, y as f32)
    }

    /// Longitude at the centre of pixel column `px`
    pub fn column_longitude(&self, px: u32) -> f64 {
        self.west + (px as f64 + 0.5) / self.width as f64 * (self.east - self.west)
    }

    /// Latitude at the centre of pixel row `py`
    pub fn row_latitude(&self, py: u32) -> f64 {
        let fraction = (py as f64 + 0.5) / self.height as f64;
        inverse_mercator_y(self.y_north - fraction * (self.y_north - self.y_south))
    }
}

/// Index of the axis label nearest to `value`, if within half a grid step.
fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
    let half_step = if axis.len() > 1 {
        (axis[1] - axis[0]).abs() / 2.0
    } else {
        f64::INFINITY
    };
    axis.iter()
        .enumerate()
        .map(|(idx, &label)| (idx, (label - value).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|&(_, distance)| distance <= half_step + 1e-9)
        .map(|(idx, _)| idx)
}

/// Line strings of a GeoJSON document, as `(lon, lat)` vertices.
///
/// Lines and polygon rings are kept; points are ignored.
pub fn geojson_lines(document: &Value) -> ForecastResult<Vec<Vec<(f64, f64)>>> {
    let mut lines = Vec::new();
    collect_lines(document, &mut lines)?;
    Ok(lines)
}

fn collect_lines(node: &Value, lines: &mut Vec<Vec<(f64, f64)>>) -> ForecastResult<()> {
    let kind = node.get("type").and_then(Value::as_str).unwrap_or_default();
    let coordinates = node.get("coordinates");
    match kind {
        "FeatureCollection" => {
            for feature in node.get("features").and_then(Value::as_array).into_iter().flatten() {
                collect_lines(feature, lines)?;
            }
        }
        "Feature" => {
            if let Some(geometry) = node.get("geometry").filter(|g| !g.is_null()) {
                collect_lines(geometry, lines)?;
            }
        }
        "GeometryCollection" => {
            for geometry in node.get("geometries").and_then(Value::as_array).into_iter().flatten() {
                collect_lines(geometry, lines)?;
            }
        }
        "LineString" => lines.push(positions(coordinates)?),
        "MultiLineString" | "Polygon" => {
            for line in nested(coordinates)? {
                lines.push(positions(Some(line))?);
            }
        }
        "MultiPolygon" => {
            for polygon in nested(coordinates)? {
                for ring in nested(Some(polygon))? {
                    lines.push(positions(Some(ring))?);
                }
            }
        }
        "Point" | "MultiPoint" => {}
        other => {
            return Err(ForecastError::Render(format!(
                "unsupported GeoJSON type '{}'",
                other
            )));
        }
    }
    Ok(())
}

fn nested(coordinates: Option<&Value>) -> ForecastResult<&Vec<Value>> {
    coordinates
        .and_then(Value::as_array)
        .ok_or_else(|| ForecastError::Render("GeoJSON coordinates are not an array".to_string()))
}

fn positions(coordinates: Option<&Value>) -> ForecastResult<Vec<(f64, f64)>> {
    nested(coordinates)?
        .iter()
        .map(|position| {
            let lon = position.get(0).and_then(Value::as_f64);
            let lat = position.get(1).and_then(Value::as_f64);
            lon.zip(lat)
                .ok_or_else(|| ForecastError::Render(format!("bad GeoJSON position {}", position)))
        })
        .collect()
}

fn load_boundary(path: &Path) -> ForecastResult<Option<Vec<Vec<(f64, f64)>>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Skipping boundary layer {}: {}", path.display(), e);
            return Ok(None);
        }
    };
    let document: Value = serde_json::from_str(&content)
        .map_err(|e| ForecastError::Render(format!("{}: {}", path.display(), e)))?;
    geojson_lines(&document).map(Some)
}

/// Whether a segment can touch the map at all
fn segment_visible(from: (f32, f32), to: (f32, f32), width: f32, height: f32) -> bool {
    let all_finite = [from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite());
    all_finite
        && !(from.0 < 0.0 && to.0 < 0.0)
        && !(from.0 > width && to.0 > width)
        && !(from.1 < 0.0 && to.1 < 0.0)
        && !(from.1 > height && to.1 > height)
}

fn draw_lines(
    image: &mut RgbImage,
    projection: &MapProjection,
    lines: &[Vec<(f64, f64)>],
    color: Rgb<u8>,
) {
    let (width, height) = (projection.width() as f32, projection.height() as f32);
    for line in lines {
        for pair in line.windows(2) {
            let from = projection.project(pair[0].0, pair[0].1);
            let to = projection.project(pair[1].0, pair[1].1);
            if segment_visible(from, to, width, height) {
                draw_line_segment_mut(image, from, to, color);
            }
        }
    }
}

fn draw_marker(image: &mut RgbImage, (x, y): (f32, f32)) {
    let (x, y) = (x.round(), y.round());
    draw_line_segment_mut(image, (x - MARKER_ARM, y), (x + MARKER_ARM, y), MARKER_COLOR);
    draw_line_segment_mut(image, (x, y - MARKER_ARM), (x, y + MARKER_ARM), MARKER_COLOR);
}

fn draw_colorbar(image: &mut RgbImage, top: u32) {
    let width = image.width();
    let inner = width.saturating_sub(2 * COLORBAR_MARGIN).max(PALETTE.len() as u32);
    let box_width = inner / PALETTE.len() as u32;
    for class in 0..PALETTE.len() {
        let left = COLORBAR_MARGIN + class as u32 * box_width;
        let rect = Rect::at(left as i32, top as i32).of_size(box_width.max(1), COLORBAR_HEIGHT);
        draw_filled_rect_mut(image, rect, class_color(class));
    }
    let outline = Rect::at(COLORBAR_MARGIN as i32, top as i32)
        .of_size((box_width * PALETTE.len() as u32).max(1), COLORBAR_HEIGHT);
    draw_hollow_rect_mut(image, outline, OUTLINE_COLOR);
}

/// Renders `variable` of a cropped dataset for a profile.
///
/// The dataset must carry `latitude` and `longitude` as its variable's last
/// two dimensions; with leading `time` / `step` axes the first field is drawn.
///
/// # Errors
///
/// - `MissingCoordinate` / `MissingVariable` when the dataset lacks them
/// - `ShapeMismatch` when the variable is not laid out latitude by longitude
/// - `Render` when a boundary layer is not valid GeoJSON
pub fn render_map(
    dataset: &GridDataset,
    variable: &str,
    profile: &ProfileConfig,
    options: &RenderOptions,
) -> ForecastResult<RgbImage> {
    let lats = dataset.coordinate(LATITUDE)?;
    let lons = dataset.coordinate(LONGITUDE)?;
    let data = dataset.variable(variable)?;
    let trailing: Vec<&str> = data.dims.iter().rev().take(2).map(String::as_str).collect();
    if trailing != [LONGITUDE, LATITUDE] {
        return Err(ForecastError::ShapeMismatch(format!(
            "'{}' is laid out over {:?}, expected latitude then longitude last",
            variable, data.dims
        )));
    }
    let plane = lats.len() * lons.len();

    let projection = MapProjection::new(&profile.bounds, options.width)?;
    let (width, height) = (projection.width(), projection.height());
    debug!("Map of {} x {} px for {}", width, height, profile.name);

    let columns: Vec<Option<usize>> = (0..width)
        .map(|px| nearest_index(lons, projection.column_longitude(px)))
        .collect();
    let rows: Vec<Option<usize>> = (0..height)
        .map(|py| nearest_index(lats, projection.row_latitude(py)))
        .collect();

    let total_height = height + COLORBAR_HEIGHT + 2 * COLORBAR_MARGIN;
    let mut image: RgbImage = ImageBuffer::from_pixel(width, total_height, BACKGROUND);
    for (py, row) in rows.iter().enumerate() {
        let Some(j) = row else { continue };
        for (px, column) in columns.iter().enumerate() {
            let Some(i) = column else { continue };
            let value = data.values[..plane][j * lons.len() + i];
            if let Some(class) = level_class(value) {
                image.put_pixel(px as u32, py as u32, class_color(class));
            }
        }
    }

    for layer in profile.visible_boundaries() {
        let color = parse_hex_color(&layer.color)?;
        if let Some(lines) = load_boundary(Path::new(&layer.path))? {
            debug!("Drawing {} lines from {}", lines.len(), layer.path);
            draw_lines(&mut image, &projection, &lines, color);
        }
    }

    for marker in &profile.markers {
        if profile.bounds.contains(marker.lon, marker.lat) {
            info!("Marker at ({}, {})", marker.lon, marker.lat);
        } else {
            warn!("Marker at ({}, {}) is outside the map", marker.lon, marker.lat);
        }
        draw_marker(&mut image, projection.project(marker.lon, marker.lat));
    }

    draw_hollow_rect_mut(
        &mut image,
        Rect::at(0, 0).of_size(width, height),
        OUTLINE_COLOR,
    );
    draw_colorbar(&mut image, height + COLORBAR_MARGIN);
    Ok(image)
}

pub fn encode_jpeg(map: &RgbImage, quality: u8) -> ForecastResult<Vec<u8>> {
    let mut jpeg_data = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg_data);
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(map, map.width(), map.height(), image::ColorType::Rgb8)
        .map_err(|e| ForecastError::Render(format!("failed to encode JPEG: {}", e)))?;
    Ok(jpeg_data)
}
