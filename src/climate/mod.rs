//! Weekly climate series and the policy that resolves one for a season.
//!
//! A season always plays against exactly [`SEASON_WEEKS`] samples. Samples come
//! from a [`ClimateSource`] when it can provide them; any week the source cannot
//! cover is synthesized by [`generate_week`].

mod generated;
mod power;

use std::future::Future;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crop::SEASON_WEEKS;

pub use generated::{generate_week, GeneratedSource, GENERATED_TAG};
pub use power::{PowerDataset, PowerDocument, WeeklyAggregate, FILL_VALUE};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateSample {
    pub week: u32,
    /// Mean air temperature, °C.
    pub temperature: f64,
    /// Rainfall, mm.
    pub rainfall: f64,
    /// Soil moisture, percent.
    pub soil_moisture: f64,
    /// Surface irradiance, MJ/m².
    pub irradiance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, thiserror::Error)]
pub enum ClimateError {
    #[error("failed to read climate dataset {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed climate dataset: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid dataset date key '{0}'")]
    InvalidDate(String),
    #[error("dataset point {found:?} does not match configured site {expected:?}")]
    LocationMismatch {
        expected: (f64, f64),
        found: (f64, f64),
    },
    #[error("climate series must cover {expected} weeks, got {actual}")]
    Incomplete { expected: usize, actual: usize },
    #[error("climate sample at position {index} is labelled week {week}")]
    WeekMismatch { index: usize, week: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("climate week {week} outside 1..={len}")]
pub struct WeekOutOfRange {
    pub week: u32,
    pub len: usize,
}

/// The resolved, immutable climate for one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateSeries {
    samples: Vec<ClimateSample>,
    source_tag: String,
    date_range: Option<DateRange>,
}

impl ClimateSeries {
    pub fn new(
        samples: Vec<ClimateSample>,
        source_tag: impl Into<String>,
    ) -> Result<Self, ClimateError> {
        if samples.len() != SEASON_WEEKS as usize {
            return Err(ClimateError::Incomplete {
                expected: SEASON_WEEKS as usize,
                actual: samples.len(),
            });
        }
        for (index, sample) in samples.iter().enumerate() {
            if sample.week as usize != index + 1 {
                return Err(ClimateError::WeekMismatch {
                    index,
                    week: sample.week,
                });
            }
        }
        Ok(Self {
            samples,
            source_tag: source_tag.into(),
            date_range: None,
        })
    }

    /// Builds a full season by asking `sample_for` for every week in order.
    /// The `week` field of each produced sample is overwritten with its slot.
    pub fn from_fn(
        source_tag: impl Into<String>,
        mut sample_for: impl FnMut(u32) -> ClimateSample,
    ) -> Self {
        let samples = (1..=SEASON_WEEKS)
            .map(|week| ClimateSample {
                week,
                ..sample_for(week)
            })
            .collect();
        Self {
            samples,
            source_tag: source_tag.into(),
            date_range: None,
        }
    }

    pub fn generated<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_fn(GENERATED_TAG, |week| generate_week(week, &mut *rng))
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Sample for a 1-based week.
    pub fn sample(&self, week: u32) -> Result<&ClimateSample, WeekOutOfRange> {
        let out_of_range = WeekOutOfRange {
            week,
            len: self.samples.len(),
        };
        if week == 0 {
            return Err(out_of_range);
        }
        self.samples.get(week as usize - 1).ok_or(out_of_range)
    }

    pub fn samples(&self) -> &[ClimateSample] {
        &self.samples
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What a climate source could deliver: one slot per week, `None` where the
/// source has no usable observations.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSeries {
    pub weeks: Vec<Option<ClimateSample>>,
    pub source_tag: String,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

impl FetchedSeries {
    pub fn empty(source_tag: impl Into<String>) -> Self {
        Self {
            weeks: Vec::new(),
            source_tag: source_tag.into(),
            date_range_start: None,
            date_range_end: None,
        }
    }

    pub fn missing_weeks(&self) -> Vec<u32> {
        (1..=SEASON_WEEKS)
            .filter(|week| !matches!(self.weeks.get(*week as usize - 1), Some(Some(_))))
            .collect()
    }

    /// Fills every uncovered week procedurally and tags the result.
    pub fn complete<R: Rng + ?Sized>(self, rng: &mut R) -> ClimateSeries {
        let missing = self.missing_weeks();
        let observed_any = missing.len() < SEASON_WEEKS as usize;
        let source_tag = if !observed_any {
            GENERATED_TAG.to_string()
        } else if missing.is_empty() || self.source_tag == GENERATED_TAG {
            self.source_tag.clone()
        } else {
            format!("{}+{}", self.source_tag, GENERATED_TAG)
        };

        let mut weeks = self.weeks;
        let series = ClimateSeries::from_fn(source_tag, |week| {
            match weeks.get_mut(week as usize - 1).and_then(Option::take) {
                Some(sample) => sample,
                None => generate_week(week, &mut *rng),
            }
        });

        match (self.date_range_start, self.date_range_end) {
            (Some(start), Some(end)) if observed_any => {
                series.with_date_range(DateRange { start, end })
            }
            _ => series,
        }
    }
}

/// Provider of observed weekly climate. Failures never reach the engine; see
/// [`resolve`].
pub trait ClimateSource {
    fn fetch_weekly_series(
        &self,
    ) -> impl Future<Output = Result<FetchedSeries, ClimateError>> + Send;
}

/// Resolves a full season from `source`, generating whatever it cannot cover.
pub async fn resolve<C, R>(source: &C, rng: &mut R) -> ClimateSeries
where
    C: ClimateSource + ?Sized,
    R: Rng + ?Sized,
{
    let fetched = match source.fetch_weekly_series().await {
        Ok(fetched) => fetched,
        Err(err) => {
            warn!(error = %err, "climate source unavailable, generating the full season");
            FetchedSeries::empty(GENERATED_TAG)
        }
    };
    let missing = fetched.missing_weeks();
    if !missing.is_empty() && fetched.source_tag != GENERATED_TAG {
        warn!(source = %fetched.source_tag, ?missing, "filling weeks without observations");
    }
    let series = fetched.complete(rng);
    info!(source = series.source_tag(), "climate series resolved");
    series
}

/// Climate source selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Dataset(PowerDataset),
    Generated(GeneratedSource),
}

impl ClimateSource for ConfiguredSource {
    async fn fetch_weekly_series(&self) -> Result<FetchedSeries, ClimateError> {
        match self {
            ConfiguredSource::Dataset(dataset) => dataset.fetch_weekly_series().await,
            ConfiguredSource::Generated(generated) => generated.fetch_weekly_series().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn sample(week: u32, rainfall: f64) -> ClimateSample {
        ClimateSample {
            week,
            temperature: 27.0,
            rainfall,
            soil_moisture: 65.0,
            irradiance: 16.0,
        }
    }

    struct FailingSource;

    impl ClimateSource for FailingSource {
        async fn fetch_weekly_series(&self) -> Result<FetchedSeries, ClimateError> {
            Err(ClimateError::InvalidDate("offline".into()))
        }
    }

    struct PartialSource;

    impl ClimateSource for PartialSource {
        async fn fetch_weekly_series(&self) -> Result<FetchedSeries, ClimateError> {
            let mut weeks: Vec<Option<ClimateSample>> =
                (1..=10).map(|week| Some(sample(week, 200.0))).collect();
            weeks[3] = None;
            Ok(FetchedSeries {
                weeks,
                source_tag: "station".into(),
                date_range_start: NaiveDate::from_ymd_opt(2024, 6, 1),
                date_range_end: NaiveDate::from_ymd_opt(2024, 9, 6),
            })
        }
    }

    #[test]
    fn sample_lookup_is_one_based() {
        let series = ClimateSeries::from_fn("fixture", |week| sample(week, week as f64));
        assert_eq!(series.len(), 14);
        assert_eq!(series.sample(1).unwrap().rainfall, 1.0);
        assert_eq!(series.sample(14).unwrap().rainfall, 14.0);
        assert_eq!(
            series.sample(0).unwrap_err(),
            WeekOutOfRange { week: 0, len: 14 }
        );
        assert_eq!(
            series.sample(15).unwrap_err(),
            WeekOutOfRange { week: 15, len: 14 }
        );
    }

    #[test]
    fn new_rejects_short_or_misnumbered_series() {
        let short: Vec<_> = (1..=13).map(|week| sample(week, 10.0)).collect();
        assert!(matches!(
            ClimateSeries::new(short, "x"),
            Err(ClimateError::Incomplete { actual: 13, .. })
        ));

        let mut shuffled: Vec<_> = (1..=14).map(|week| sample(week, 10.0)).collect();
        shuffled.swap(2, 3);
        assert!(matches!(
            ClimateSeries::new(shuffled, "x"),
            Err(ClimateError::WeekMismatch { index: 2, week: 4 })
        ));
    }

    #[tokio::test]
    async fn failing_source_falls_back_to_generated_season() {
        let mut rng = StepRng::new(0, 0);
        let series = resolve(&FailingSource, &mut rng).await;
        assert_eq!(series.len(), 14);
        assert_eq!(series.source_tag(), GENERATED_TAG);
        assert!(series.date_range().is_none());
        assert_eq!(series.sample(3).unwrap().rainfall, 50.0);
    }

    #[tokio::test]
    async fn partial_source_keeps_observed_weeks() {
        let mut rng = StepRng::new(0, 0);
        let series = resolve(&PartialSource, &mut rng).await;
        assert_eq!(series.source_tag(), "station+generated");
        assert_eq!(series.sample(1).unwrap().rainfall, 200.0);
        assert_eq!(series.sample(4).unwrap().rainfall, 50.0);
        assert_eq!(series.sample(10).unwrap().rainfall, 200.0);
        assert_eq!(series.sample(11).unwrap().rainfall, 50.0);
        for (index, sample) in series.samples().iter().enumerate() {
            assert_eq!(sample.week as usize, index + 1);
        }
        let range = series.date_range().expect("observed range kept");
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }
}
