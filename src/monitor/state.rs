use crate::config::MonitorSettings;
use crate::pipeline::cooldown::CooldownGate;
use crate::pipeline::debounce::DebounceGate;

/// Decision state carried from one tick to the next.
///
/// Owned by the scheduler task while the monitor runs and handed back on stop.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub debounce: DebounceGate,
    pub cooldown: CooldownGate,
}

impl MonitorState {
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            debounce: DebounceGate::new(settings.required_consecutive_hits),
            cooldown: CooldownGate::new(settings.alert_cooldown_ms),
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(&MonitorSettings::default())
    }
}
