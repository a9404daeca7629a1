use rand::Rng;

use super::{ClimateError, ClimateSample, ClimateSource, FetchedSeries};

pub const GENERATED_TAG: &str = "generated";

/// Synthesizes one week of monsoon-season weather.
pub fn generate_week<R: Rng + ?Sized>(week: u32, rng: &mut R) -> ClimateSample {
    let base_temperature = 25.0 + (week as f64 / 2.0).sin() * 5.0;
    ClimateSample {
        week,
        temperature: base_temperature + uniform(rng, 3.0),
        rainfall: 50.0 + uniform(rng, 100.0),
        soil_moisture: 60.0 + uniform(rng, 20.0),
        irradiance: 15.0 + uniform(rng, 5.0),
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, span: f64) -> f64 {
    rng.gen::<f64>() * span
}

/// Source that never has observations, so every week is generated.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratedSource;

impl ClimateSource for GeneratedSource {
    async fn fetch_weekly_series(&self) -> Result<FetchedSeries, ClimateError> {
        Ok(FetchedSeries::empty(GENERATED_TAG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn generated_values_stay_in_policy_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            for week in 1..=14 {
                let sample = generate_week(week, &mut rng);
                let base = 25.0 + (week as f64 / 2.0).sin() * 5.0;
                assert!(sample.temperature >= base && sample.temperature < base + 3.0);
                assert!((50.0..150.0).contains(&sample.rainfall));
                assert!((60.0..80.0).contains(&sample.soil_moisture));
                assert!((15.0..20.0).contains(&sample.irradiance));
                assert_eq!(sample.week, week);
            }
        }
    }

    #[test]
    fn zero_noise_gives_the_floor_of_each_range() {
        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let sample = generate_week(2, &mut rng);
        assert!((sample.temperature - (25.0 + 1f64.sin() * 5.0)).abs() < 1e-12);
        assert_eq!(sample.rainfall, 50.0);
        assert_eq!(sample.soil_moisture, 60.0);
        assert_eq!(sample.irradiance, 15.0);
    }
}
