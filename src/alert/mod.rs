pub mod dispatcher;
pub mod multipart;
pub mod payload;

pub use dispatcher::{AlertDispatcher, HttpAlertDispatcher};
pub use payload::AlertPayload;
