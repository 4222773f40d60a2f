pub const DEFAULT_REQUIRED_CONSECUTIVE_HITS: u32 = 3;

/// Counts consecutive positive detections; a detection is confirmed once the run reaches
/// `required` hits.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    consecutive_hits: u32,
    required: u32,
}

impl DebounceGate {
    pub fn new(required: u32) -> Self {
        Self {
            consecutive_hits: 0,
            required,
        }
    }

    /// Feeds one detection in and returns the current run length.
    pub fn update(&mut self, is_positive: bool) -> u32 {
        if is_positive {
            self.consecutive_hits = self.consecutive_hits.saturating_add(1);
        } else {
            self.consecutive_hits = 0;
        }
        self.consecutive_hits
    }

    pub fn is_confirmed(&self) -> bool {
        self.consecutive_hits >= self.required
    }

    pub fn reset(&mut self) {
        self.consecutive_hits = 0;
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }

    pub fn required(&self) -> u32 {
        self.required
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_CONSECUTIVE_HITS)
    }
}
