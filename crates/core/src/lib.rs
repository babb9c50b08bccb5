pub mod alert;
pub mod config;
pub mod error;
pub mod log_record;
pub mod rule;
pub mod window;

pub use alert::*;
pub use config::Config;
pub use error::*;
pub use log_record::*;
pub use rule::RuleDefinition;
pub use window::{TimeWindow, MAX_WINDOW_MINUTES};
