pub mod clock;
pub mod frame;

pub use clock::{Clock, SystemClock};
pub use frame::Frame;
