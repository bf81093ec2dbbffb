//! Ingestion and date-filtered retrieval of drone air-quality readings.
//!
//! An upload of `longitude,latitude,aqi` lines is parsed in full by
//! [`readers::BatchParser`], then committed as one transaction by a
//! [`store::ReadingStore`]. Queries go straight to the store through a
//! validated [`models::DateFilter`].

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod server;
pub mod store;
pub mod utils;

pub use error::{DronitorError, ErrorKind, Result};
