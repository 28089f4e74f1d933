use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Parameter order of every seasonal record.
pub const SEASONAL_PARAMS: [&str; 17] = [
    "MinTemp",
    "MaxTemp",
    "Rainfall",
    "Evaporation",
    "Sunshine",
    "WindGustSpeed",
    "WindSpeed9am",
    "WindSpeed3pm",
    "Humidity9am",
    "Humidity3pm",
    "Pressure9am",
    "Pressure3pm",
    "Cloud9am",
    "Cloud3pm",
    "Temp9am",
    "Temp3pm",
    "RainToday",
];

const SUMMER: [f64; 17] = [
    20.0, 30.0, 2.0, 8.0, 10.0, 40.0, 15.0, 20.0, 65.0, 50.0, 1013.0, 1011.0, 3.0, 4.0, 24.0, 28.0, 0.0,
];
const AUTUMN: [f64; 17] = [
    14.0, 23.0, 3.0, 5.0, 7.0, 35.0, 12.0, 18.0, 70.0, 55.0, 1015.0, 1013.0, 4.0, 5.0, 18.0, 22.0, 0.0,
];
const WINTER: [f64; 17] = [
    8.0, 17.0, 5.0, 2.0, 6.0, 35.0, 10.0, 15.0, 75.0, 60.0, 1020.0, 1018.0, 5.0, 6.0, 12.0, 16.0, 0.0,
];
const SPRING: [f64; 17] = [
    12.0, 22.0, 3.0, 6.0, 8.0, 38.0, 13.0, 19.0, 68.0, 52.0, 1016.0, 1014.0, 4.0, 4.0, 16.0, 21.0, 0.0,
];

/// Southern-Hemisphere seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl Season {
    /// `None` outside 1..=12.
    pub fn of_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Season::Summer),
            3..=5 => Some(Season::Autumn),
            6..=8 => Some(Season::Winter),
            9..=11 => Some(Season::Spring),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
            Season::Spring => "Spring",
        }
    }

    /// `"Summer (Dec-Feb)"`
    pub fn range_label(self) -> &'static str {
        match self {
            Season::Summer => "Summer (Dec-Feb)",
            Season::Autumn => "Autumn (Mar-May)",
            Season::Winter => "Winter (Jun-Aug)",
            Season::Spring => "Spring (Sep-Nov)",
        }
    }

    fn values(self) -> &'static [f64; 17] {
        match self {
            Season::Summer => &SUMMER,
            Season::Autumn => &AUTUMN,
            Season::Winter => &WINTER,
            Season::Spring => &SPRING,
        }
    }
}

/// `(sin(2πm/12), cos(2πm/12))`
pub fn month_encoding(month: f64) -> (f64, f64) {
    let angle = 2.0 * PI * month / 12.0;
    (angle.sin(), angle.cos())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalDefaults {
    pub month: u32,
    pub season: Season,
    pub month_sin: f64,
    pub month_cos: f64,
}

impl SeasonalDefaults {
    /// The 17 fixed parameters followed by the month encoding, in display order.
    pub fn parameters(&self) -> Vec<(&'static str, f64)> {
        let mut out: Vec<(&'static str, f64)> = SEASONAL_PARAMS
            .iter()
            .copied()
            .zip(self.season.values().iter().copied())
            .collect();
        out.push(("month_sin", self.month_sin));
        out.push(("month_cos", self.month_cos));
        out
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeasonalError {
    #[error("Please provide a month number (1-12, where 1=January, 12=December) to get seasonal weather defaults.")]
    MissingMonth,

    #[error("Invalid month: {0}. Please provide a month number between 1 and 12.")]
    InvalidMonth(i64),
}

pub fn seasonal_defaults(month: Option<i64>) -> Result<SeasonalDefaults, SeasonalError> {
    let month = month.ok_or(SeasonalError::MissingMonth)?;
    let season = u32::try_from(month)
        .ok()
        .and_then(Season::of_month)
        .ok_or(SeasonalError::InvalidMonth(month))?;
    let (month_sin, month_cos) = month_encoding(month as f64);
    Ok(SeasonalDefaults {
        month: month as u32,
        season,
        month_sin,
        month_cos,
    })
}

/// Whole numbers keep one decimal (`20.0`), the flag stays integral.
fn render_value(param: &str, value: f64) -> String {
    match param {
        "month_sin" | "month_cos" => format!("{:.6}", value),
        "RainToday" => format!("{}", value as i64),
        _ if value.fract() == 0.0 => format!("{:.1}", value),
        _ => value.to_string(),
    }
}

impl fmt::Display for SeasonalDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let season = self.season.name();
        write!(
            f,
            "Season: {} ({})\n\nTypical weather conditions for {} in Australia:\n",
            season,
            self.month_name(),
            season
        )?;
        for (param, value) in self.parameters() {
            writeln!(f, "  {}: {}", param, render_value(param, value))?;
        }
        write!(
            f,
            "\nNote: month_sin and month_cos are cyclical encodings of the month (preserves seasonal periodicity)."
        )
    }
}
