use super::Alert;

/// The currently displayed alerts.
///
/// Every evaluation cycle replaces the whole set, so an alert whose
/// condition cleared disappears without being dismissed. Dismissal is not
/// sticky: a dismissed alert comes back on the next cycle if its condition
/// still holds (a known UX trade-off: a persistent violation re-appears every
/// cycle).
#[derive(Debug, Clone, Default)]
pub struct AlertStore {
    active: Vec<Alert>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, alerts: Vec<Alert>) {
        self.active = alerts;
    }

    /// Remove the alert with `id`. Returns `false` if it was not active.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|a| a.id != id);
        self.active.len() != before
    }

    pub fn active(&self) -> &[Alert] {
        &self.active
    }
}
