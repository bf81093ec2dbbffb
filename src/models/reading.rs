use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use validator::Validate;

use crate::utils::constants::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};

/// The three client-supplied columns of an upload line, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Longitude,
    Latitude,
    Aqi,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Longitude => "longitude",
            Field::Latitude => "latitude",
            Field::Aqi => "aqi",
        }
    }

    fn allowed_range(&self) -> &'static str {
        match self {
            Field::Longitude => "[-180, 180]",
            Field::Latitude => "[-90, 90]",
            Field::Aqi => "[0, 4294967295]",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("wrong field count: expected 3, found {found}")]
    WrongFieldCount { found: usize },

    #[error("{field} is not a number: '{value}'")]
    NotANumber { field: Field, value: String },

    #[error("{field} out of range: {value} (allowed {})", .field.allowed_range())]
    OutOfRange { field: Field, value: String },
}

impl RecordError {
    pub fn field(&self) -> Option<Field> {
        match self {
            RecordError::WrongFieldCount { .. } => None,
            RecordError::NotANumber { field, .. } | RecordError::OutOfRange { field, .. } => {
                Some(*field)
            }
        }
    }
}

/// A validated observation that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewReading {
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    pub aqi: u32,

    pub raw_data: String,
}

impl NewReading {
    pub fn new(longitude: f64, latitude: f64, aqi: i64) -> Result<Self, RecordError> {
        let longitude = check_coordinate(Field::Longitude, longitude, MIN_LONGITUDE, MAX_LONGITUDE)?;
        let latitude = check_coordinate(Field::Latitude, latitude, MIN_LATITUDE, MAX_LATITUDE)?;
        let aqi = u32::try_from(aqi).map_err(|_| RecordError::OutOfRange {
            field: Field::Aqi,
            value: aqi.to_string(),
        })?;

        Ok(Self {
            longitude,
            latitude,
            aqi,
            raw_data: format!("{},{},{}", longitude, latitude, aqi),
        })
    }

    /// Build a reading from the raw `longitude, latitude, aqi` tokens of one line.
    pub fn from_tokens(tokens: &[&str]) -> Result<Self, RecordError> {
        let [longitude, latitude, aqi] = tokens else {
            return Err(RecordError::WrongFieldCount {
                found: tokens.len(),
            });
        };

        let longitude = parse_decimal(Field::Longitude, longitude)?;
        let latitude = parse_decimal(Field::Latitude, latitude)?;
        let aqi = parse_integer(Field::Aqi, aqi)?;

        let mut reading = Self::new(longitude, latitude, aqi)?;
        reading.raw_data = tokens
            .iter()
            .map(|t| t.trim())
            .collect::<Vec<_>>()
            .join(",");
        Ok(reading)
    }
}

fn parse_decimal(field: Field, token: &str) -> Result<f64, RecordError> {
    let trimmed = token.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RecordError::NotANumber {
            field,
            value: trimmed.to_string(),
        }),
    }
}

fn parse_integer(field: Field, token: &str) -> Result<i64, RecordError> {
    let trimmed = token.trim();
    trimmed.parse::<i64>().map_err(|e| {
        use std::num::IntErrorKind;
        match e.kind() {
            // Syntactically an integer, just too large for the column
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => RecordError::OutOfRange {
                field,
                value: trimmed.to_string(),
            },
            _ => RecordError::NotANumber {
                field,
                value: trimmed.to_string(),
            },
        }
    })
}

fn check_coordinate(field: Field, value: f64, min: f64, max: f64) -> Result<f64, RecordError> {
    if !value.is_finite() {
        return Err(RecordError::NotANumber {
            field,
            value: value.to_string(),
        });
    }
    if !(min..=max).contains(&value) {
        return Err(RecordError::OutOfRange {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// A persisted observation with its store-assigned identity and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub aqi: u32,
    pub recorded_at: DateTime<Utc>,
    pub raw_data: String,
}

impl Reading {
    pub fn from_new(id: i64, reading: &NewReading, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            longitude: reading.longitude,
            latitude: reading.latitude,
            aqi: reading.aqi,
            recorded_at,
            raw_data: reading.raw_data.clone(),
        }
    }

    pub fn recorded_on(&self) -> chrono::NaiveDate {
        self.recorded_at.date_naive()
    }
}
