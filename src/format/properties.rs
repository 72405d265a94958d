//! Slide properties as a flat string map.
//!
//! Keys are namespaced: `tiff.*` for baseline tags of the first IFD,
//! `aperio.*` for Aperio ImageDescription fields and `eozin.*` for values
//! derived by this crate (vendor, resolution, level geometry).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::tiff::{PyramidLevel, TiffPyramid, TiffTag, ValueReader};

pub const PROPERTY_VENDOR: &str = "eozin.vendor";
pub const PROPERTY_COMMENT: &str = "eozin.comment";
pub const PROPERTY_MPP_X: &str = "eozin.mpp-x";
pub const PROPERTY_MPP_Y: &str = "eozin.mpp-y";
pub const PROPERTY_OBJECTIVE_POWER: &str = "eozin.objective-power";
pub const PROPERTY_LEVEL_COUNT: &str = "eozin.level-count";

/// Baseline string tags copied into `tiff.*` properties
const STRING_TAGS: [TiffTag; 5] = [
    TiffTag::ImageDescription,
    TiffTag::Make,
    TiffTag::Model,
    TiffTag::Software,
    TiffTag::DateTime,
];

/// ResolutionUnit value for centimeters
const RESOLUTION_UNIT_CENTIMETER: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SlideProperties {
    map: BTreeMap<String, String>,
}

impl SlideProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn vendor(&self) -> Option<&str> {
        self.get(PROPERTY_VENDOR)
    }

    /// Microns per pixel along X and Y at level 0.
    pub fn mpp(&self) -> Option<(f64, f64)> {
        let x = self.get(PROPERTY_MPP_X)?.parse().ok()?;
        let y = self.get(PROPERTY_MPP_Y)?.parse().ok()?;
        Some((x, y))
    }

    pub fn objective_power(&self) -> Option<f64> {
        self.get(PROPERTY_OBJECTIVE_POWER)?.parse().ok()
    }

    /// Add `eozin.level-count` and per-level geometry keys.
    pub fn add_levels(&mut self, levels: &[PyramidLevel]) {
        self.insert(PROPERTY_LEVEL_COUNT, levels.len().to_string());
        for level in levels {
            let prefix = format!("eozin.level[{}]", level.level_index);
            self.insert(format!("{prefix}.width"), level.width.to_string());
            self.insert(format!("{prefix}.height"), level.height.to_string());
            self.insert(format!("{prefix}.tile-width"), level.tile_width.to_string());
            self.insert(format!("{prefix}.tile-height"), level.tile_height.to_string());
            self.insert(format!("{prefix}.downsample"), level.downsample.to_string());
        }
    }
}

/// Read `tiff.*` properties from the first IFD.
///
/// Unreadable tags are skipped; only I/O failures are errors.
pub async fn read_tiff_properties<R: RangeReader>(
    reader: &R,
    pyramid: &TiffPyramid,
) -> Result<SlideProperties, TiffError> {
    let mut properties = SlideProperties::new();
    let Some(ifd) = pyramid.first_ifd() else {
        return Ok(properties);
    };
    let values = ValueReader::new(reader, &pyramid.header);

    for tag in STRING_TAGS {
        let Some(entry) = ifd.get_entry_by_tag(tag) else {
            continue;
        };
        match values.read_string(entry).await {
            Ok(value) => properties.insert(format!("tiff.{}", tag.name()), value),
            Err(TiffError::Io(e)) => return Err(TiffError::Io(e)),
            Err(_) => continue,
        }
    }

    if let Some(description) = properties.get("tiff.ImageDescription").map(str::to_string) {
        properties.insert(PROPERTY_COMMENT, description);
    }

    let unit = ifd
        .get_u32(TiffTag::ResolutionUnit, pyramid.header.byte_order)
        .unwrap_or(2);
    properties.insert("tiff.ResolutionUnit", unit.to_string());

    for (tag, key, mpp_key) in [
        (TiffTag::XResolution, "tiff.XResolution", PROPERTY_MPP_X),
        (TiffTag::YResolution, "tiff.YResolution", PROPERTY_MPP_Y),
    ] {
        let Some(entry) = ifd.get_entry_by_tag(tag) else {
            continue;
        };
        let resolution = match values.read_rational(entry).await {
            Ok(resolution) => resolution,
            Err(TiffError::Io(e)) => return Err(TiffError::Io(e)),
            Err(_) => continue,
        };
        properties.insert(key, resolution.to_string());
        if unit == RESOLUTION_UNIT_CENTIMETER && resolution > 0.0 {
            properties.insert(mpp_key, (10_000.0 / resolution).to_string());
        }
    }

    Ok(properties)
}
