use crate::pipeline::scoring::DetectionLabel;
use std::fmt;

/// Per-tick status published for display.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub label: DetectionLabel,
    pub confidence: f32,
    pub hits: u32,
    pub required: u32,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.2}) hits {}/{}",
            self.label, self.confidence, self.hits, self.required
        )
    }
}
