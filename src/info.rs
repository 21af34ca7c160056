//! # GRIB File Information Module
//!
//! Lists the submessages of a cached GRIB2 file with the fields used to pick
//! the cloud cover field, and prints them as text, JSON, YAML or CSV.

use crate::grib::MessageKey;
use crate::storage::{LocalStorage, StorageBackend};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// One GRIB2 submessage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GribMessageInfo {
    /// `message.submessage`
    pub index: String,
    pub discipline: u8,
    pub category: Option<u8>,
    pub number: Option<u8>,
    pub grid_template: u16,
    pub product_template: u16,
    pub surface_type: Option<u8>,
    pub forecast_time: Option<u32>,
    pub grid_shape: Option<(usize, usize)>,
    pub total_cloud_cover: bool,
}

/// Summary of a GRIB2 file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GribInfo {
    pub path: String,
    pub file_size: u64,
    pub total_messages: usize,
    pub messages: Vec<GribMessageInfo>,
}

impl GribInfo {
    pub fn cloud_cover_message(&self) -> Option<&GribMessageInfo> {
        self.messages.iter().find(|m| m.total_cloud_cover)
    }
}

/// Reads the submessage table of a GRIB2 file.
///
/// With `cloud_cover_only`, only the submessage the map is drawn from is
/// listed; `total_messages` still counts them all.
pub async fn get_grib_info(file_path: &str, cloud_cover_only: bool) -> Result<GribInfo> {
    let data = LocalStorage
        .read(file_path)
        .await
        .with_context(|| format!("Failed to read GRIB file: {}", file_path))?;
    debug!("Read {} bytes from {}", data.len(), file_path);

    let grib2 = grib::from_reader(Cursor::new(&data))
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Failed to parse GRIB file: {}", file_path))?;

    let mut messages = Vec::new();
    let mut total_messages = 0;
    for ((message, submessage_index), submessage) in grib2.iter() {
        total_messages += 1;
        let key = MessageKey::of(&submessage);
        if cloud_cover_only && !key.is_total_cloud_cover() {
            continue;
        }
        let prod_def = submessage.prod_def();
        messages.push(GribMessageInfo {
            index: format!("{}.{}", message, submessage_index),
            discipline: key.discipline,
            category: key.category,
            number: key.number,
            grid_template: submessage.grid_def().grid_tmpl_num(),
            product_template: key.template,
            surface_type: key.surface_type,
            forecast_time: prod_def.forecast_time().map(|ft| ft.value),
            grid_shape: submessage.grid_shape().ok(),
            total_cloud_cover: key.is_total_cloud_cover(),
        });
    }

    Ok(GribInfo {
        path: file_path.to_string(),
        file_size: data.len() as u64,
        total_messages,
        messages,
    })
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_else(|| "-".to_string())
}

/// Print GRIB info in human-readable format
pub fn print_file_info_human(info: &GribInfo) {
    println!("GRIB2 File Information:");
    println!("  Path: {}", info.path);
    println!("  File Size: {:.2} MB", info.file_size as f64 / 1_048_576.0);
    println!("  Submessages: {} total", info.total_messages);
    for msg in &info.messages {
        println!(
            "    {:>7}  {}.{}.{}  template 4.{}  surface {}  t+{}{}",
            msg.index,
            msg.discipline,
            optional(&msg.category),
            optional(&msg.number),
            msg.product_template,
            optional(&msg.surface_type),
            optional(&msg.forecast_time),
            if msg.total_cloud_cover { "  <- map field" } else { "" }
        );
        if let Some((ni, nj)) = msg.grid_shape {
            println!("             grid 3.{} {} x {}", msg.grid_template, ni, nj);
        }
    }
    if info.cloud_cover_message().is_none() {
        println!("  No total cloud cover field found");
    }
}

/// Print GRIB info in JSON format
pub fn print_file_info_json(info: &GribInfo) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

/// Print GRIB info in YAML format
pub fn print_file_info_yaml(info: &GribInfo) -> Result<()> {
    let yaml = serde_yaml::to_string(info).context("Failed to serialize GRIB info to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print GRIB info in CSV format, one row per submessage
pub fn print_file_info_csv(info: &GribInfo) -> Result<()> {
    println!("index,discipline,category,number,template,surface_type,forecast_time,grid_template,cloud_cover");
    for msg in &info.messages {
        println!(
            "{},{},{},{},{},{},{},{},{}",
            msg.index,
            msg.discipline,
            optional(&msg.category),
            optional(&msg.number),
            msg.product_template,
            optional(&msg.surface_type),
            optional(&msg.forecast_time),
            msg.grid_template,
            msg.total_cloud_cover
        );
    }
    Ok(())
}
