pub const DEFAULT_ALERT_COOLDOWN_MS: i64 = 60_000;

/// Enforces a minimum spacing between accepted alerts.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown_ms: i64,
    last_alert_ms: Option<i64>,
}

impl CooldownGate {
    pub fn new(cooldown_ms: i64) -> Self {
        Self {
            cooldown_ms,
            last_alert_ms: None,
        }
    }

    /// Checks the cooldown and, if it has elapsed, records `now_ms` as the last alert time.
    ///
    /// A clock that moved backwards never passes the check, so the recorded time only
    /// moves forward.
    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        let permitted = match self.last_alert_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.cooldown_ms,
        };
        if permitted {
            self.last_alert_ms = Some(now_ms);
        }
        permitted
    }

    /// Re-applies a previously accepted alert time. Never moves the recorded time backwards.
    pub fn restore(&mut self, last_alert_ms: i64) {
        if self.last_alert_ms.map_or(true, |last| last_alert_ms > last) {
            self.last_alert_ms = Some(last_alert_ms);
        }
    }

    pub fn last_alert_ms(&self) -> Option<i64> {
        self.last_alert_ms
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN_MS)
    }
}
