pub mod alert;
pub mod common;
pub mod config;
pub mod error;
pub mod intake;
pub mod monitor;
pub mod pipeline;

pub use error::{AppError, TickError, UploadError};

pub use config::Settings;
pub use monitor::{MonitorLoop, MonitorStatus};
