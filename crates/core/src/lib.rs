#![forbid(unsafe_code)]

pub mod error;
pub mod format;
pub mod model;
pub mod stats;
pub mod time;

pub use error::ProgressError;
pub use format::format_time;
pub use time::Clock;
