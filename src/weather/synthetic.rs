use chrono::{Duration, NaiveDate};
use rand::{seq::SliceRandom, Rng};

use super::models::{ForecastDay, WeatherReport};

const CONDITIONS: &[&str] = &["Sunny", "Cloudy", "Partly Cloudy", "Clear"];

/// Random but plausible weather, shown while the dashboard runs on the
/// synthetic generator so no provider quota is spent.
#[derive(Debug, Clone, Default)]
pub struct SyntheticWeather;

impl SyntheticWeather {
    pub fn new() -> Self {
        Self
    }

    /// A report for `city` with a three-day forecast starting the day after
    /// `today`.
    pub fn report<R: Rng>(&self, rng: &mut R, city: &str, today: NaiveDate) -> WeatherReport {
        let forecast = (1..=3)
            .map(|offset| {
                let date = today + Duration::days(offset);
                ForecastDay {
                    date: date.format("%Y-%m-%d").to_string(),
                    weekday: date.format("%a").to_string(),
                    avg_temp_c: rng.gen_range(18..35) as f64,
                    condition: pick_condition(rng),
                }
            })
            .collect();

        WeatherReport {
            city: city.to_owned(),
            current_temp_c: rng.gen_range(20..35) as f64,
            humidity_pct: rng.gen_range(40..80) as f64,
            condition: pick_condition(rng),
            forecast,
        }
    }
}

fn pick_condition<R: Rng>(rng: &mut R) -> String {
    CONDITIONS.choose(rng).copied().unwrap_or("Clear").to_owned()
}
