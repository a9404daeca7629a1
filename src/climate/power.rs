//! Daily point data in the NASA POWER JSON layout, folded into season weeks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::{ClimateError, ClimateSample, ClimateSource, FetchedSeries};
use crate::crop::SEASON_WEEKS;

/// Marker POWER writes for days without a valid observation.
pub const FILL_VALUE: f64 = -999.0;

/// Degrees a file's point may sit from the configured site.
const COORDINATE_TOLERANCE: f64 = 0.01;
const DAYS_PER_WEEK: usize = 7;
const DATE_KEY_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Deserialize)]
pub struct PowerDocument {
    #[serde(default)]
    geometry: Option<PowerGeometry>,
    properties: PowerProperties,
}

/// GeoJSON point: longitude, latitude, elevation.
#[derive(Debug, Clone, Deserialize)]
struct PowerGeometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct PowerProperties {
    parameter: PowerParameters,
}

#[derive(Debug, Clone, Deserialize)]
struct PowerParameters {
    #[serde(rename = "T2M")]
    temperature: BTreeMap<String, Option<f64>>,
    #[serde(rename = "PRECTOTCORR", default)]
    precipitation: BTreeMap<String, Option<f64>>,
    #[serde(rename = "GWETPROF", default)]
    soil_wetness: BTreeMap<String, Option<f64>>,
    #[serde(rename = "ALLSKY_SFC_SW_DWN", default)]
    irradiance: BTreeMap<String, Option<f64>>,
}

/// Weekly means for the first season-length window of a daily record.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyAggregate {
    pub weeks: Vec<Option<ClimateSample>>,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
}

impl PowerDocument {
    pub fn from_json(text: &str) -> Result<Self, ClimateError> {
        Ok(serde_json::from_str(text)?)
    }

    /// `(latitude, longitude)` of the point the file was requested for.
    pub fn point(&self) -> Option<(f64, f64)> {
        match self.geometry.as_ref()?.coordinates.as_slice() {
            [longitude, latitude, ..] => Some((*latitude, *longitude)),
            _ => None,
        }
    }

    /// Means over consecutive 7-day blocks. A day counts only when its
    /// temperature is observed; other parameters missing on a counted day
    /// contribute zero.
    pub fn weekly(&self) -> Result<WeeklyAggregate, ClimateError> {
        let parameter = &self.properties.parameter;
        let window = DAYS_PER_WEEK * SEASON_WEEKS as usize;
        let dates: Vec<&String> = parameter.temperature.keys().take(window).collect();

        let mut weeks = Vec::with_capacity(SEASON_WEEKS as usize);
        for (index, days) in dates.chunks(DAYS_PER_WEEK).enumerate() {
            let mut temperature = 0.0;
            let mut rainfall = 0.0;
            let mut wetness = 0.0;
            let mut irradiance = 0.0;
            let mut count = 0_u32;
            for date in days {
                let Some(t2m) = observed(&parameter.temperature, date) else {
                    continue;
                };
                temperature += t2m;
                rainfall += observed(&parameter.precipitation, date).unwrap_or(0.0);
                wetness += observed(&parameter.soil_wetness, date).unwrap_or(0.0);
                irradiance += observed(&parameter.irradiance, date).unwrap_or(0.0);
                count += 1;
            }
            if count == 0 {
                weeks.push(None);
                continue;
            }
            let days = count as f64;
            weeks.push(Some(ClimateSample {
                week: index as u32 + 1,
                temperature: temperature / days,
                rainfall: rainfall / days,
                soil_moisture: wetness / days * 100.0,
                irradiance: irradiance / days,
            }));
        }

        Ok(WeeklyAggregate {
            weeks,
            first_day: dates.first().map(|key| parse_date(key)).transpose()?,
            last_day: dates.last().map(|key| parse_date(key)).transpose()?,
        })
    }
}

fn observed(values: &BTreeMap<String, Option<f64>>, date: &str) -> Option<f64> {
    values
        .get(date)
        .copied()
        .flatten()
        .filter(|value| *value > FILL_VALUE)
}

fn parse_date(key: &str) -> Result<NaiveDate, ClimateError> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
        .map_err(|_| ClimateError::InvalidDate(key.to_string()))
}

/// A downloaded POWER daily file for one location and year.
#[derive(Debug, Clone)]
pub struct PowerDataset {
    path: PathBuf,
    location: String,
    year: i32,
    coordinates: Option<(f64, f64)>,
}

impl PowerDataset {
    pub fn new(path: impl AsRef<Path>, location: impl Into<String>, year: i32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            location: location.into(),
            year,
            coordinates: None,
        }
    }

    /// Only accept files whose point lies at this site.
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some((latitude, longitude));
        self
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.coordinates
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_tag(&self) -> String {
        format!("nasa-power:{}-{}", self.location, self.year)
    }

    pub async fn load(&self) -> Result<PowerDocument, ClimateError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ClimateError::Io {
                path: self.path.clone(),
                source,
            })?;
        PowerDocument::from_json(&text)
    }
}

impl ClimateSource for PowerDataset {
    async fn fetch_weekly_series(&self) -> Result<FetchedSeries, ClimateError> {
        let document = self.load().await?;
        if let (Some(expected), Some(found)) = (self.coordinates, document.point()) {
            let off = (expected.0 - found.0).abs().max((expected.1 - found.1).abs());
            if off > COORDINATE_TOLERANCE {
                return Err(ClimateError::LocationMismatch { expected, found });
            }
        }
        let aggregate = document.weekly()?;
        Ok(FetchedSeries {
            weeks: aggregate.weeks,
            source_tag: self.source_tag(),
            date_range_start: aggregate.first_day,
            date_range_end: aggregate.last_day,
        })
    }
}
