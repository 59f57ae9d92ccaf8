//! proms-sync copies PROMS daily records into a Google sheet, using the newest `created_at` date in
//! the sheet as the point to resume from.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod model;
mod pipeline;
mod utils;


pub use api::Mode;
pub use config::{Config, PromsConfig, RequestEncoding};
pub use error::Error;
pub use error::Result;
pub use pipeline::{DayReport, SyncReport};
