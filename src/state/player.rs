use serde::{Deserialize, Serialize};

/// Per-player state for the current event.
///
/// Invariant: `deck_submitted == false` implies `deck_link == None` implies
/// `deck_reviewed == false`. All mutation goes through the methods below so
/// the invariant holds for every reachable state, not just fresh records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    /// Display name in the external community, set by the player via connect.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Whether the player is currently admitted to the event.
    #[serde(default)]
    pub registered: bool,

    /// Last submitted decklist link.
    #[serde(default)]
    pub deck_link: Option<String>,

    /// True iff a link is currently on file.
    #[serde(default)]
    pub deck_submitted: bool,

    /// True iff staff marked the current submission reviewed.
    #[serde(default)]
    pub deck_reviewed: bool,
}

impl PlayerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record for a legacy-admitted identity.
    pub fn admitted() -> Self {
        Self {
            registered: true,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.display_name.is_some()
    }

    pub fn set_display_name(&mut self, name: &str) {
        self.display_name = Some(name.to_string());
    }

    pub fn set_registered(&mut self, registered: bool) {
        self.registered = registered;
    }

    /// Accept a new submission. Always overwrites the previous link and
    /// resets the review flag: there is no submission history.
    pub fn accept_deck(&mut self, link: &str) {
        self.deck_link = Some(link.to_string());
        self.deck_submitted = true;
        self.deck_reviewed = false;
    }

    /// Drop any submission on file. Review state cannot outlive the link.
    pub fn clear_deck(&mut self) {
        self.deck_link = None;
        self.deck_submitted = false;
        self.deck_reviewed = false;
    }

    pub fn set_reviewed(&mut self, reviewed: bool) {
        debug_assert!(self.deck_submitted);
        self.deck_reviewed = reviewed;
    }

    /// Reset everything to defaults, keeping the identity key alive in the
    /// registry. Used by the remove operation.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True if the record carries nothing a remove could undo.
    pub fn is_blank(&self) -> bool {
        !self.registered && !self.deck_submitted && self.deck_link.is_none()
    }

    /// Repair invariant violations in records decoded from old or
    /// hand-edited state files.
    pub fn normalize(&mut self) {
        if self.deck_link.is_none() {
            self.deck_submitted = false;
        }
        if !self.deck_submitted {
            self.deck_link = None;
            self.deck_reviewed = false;
        }
    }

    /// Invariant check, used by tests and debug assertions.
    pub fn invariant_holds(&self) -> bool {
        if !self.deck_submitted {
            self.deck_link.is_none() && !self.deck_reviewed
        } else {
            self.deck_link.is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_blank() {
        let record = PlayerRecord::new();
        assert!(record.is_blank());
        assert!(record.invariant_holds());
        assert!(!record.is_connected());
    }

    #[test]
    fn test_accept_deck_resets_review() {
        let mut record = PlayerRecord::new();
        record.accept_deck("https://archive.example/deck/1");
        record.set_reviewed(true);
        assert!(record.deck_reviewed);

        record.accept_deck("https://archive.example/deck/2");
        assert!(record.deck_submitted);
        assert!(!record.deck_reviewed);
        assert_eq!(
            record.deck_link.as_deref(),
            Some("https://archive.example/deck/2")
        );
        assert!(record.invariant_holds());
    }

    #[test]
    fn test_clear_deck_drops_review() {
        let mut record = PlayerRecord::new();
        record.accept_deck("https://x");
        record.set_reviewed(true);
        record.clear_deck();
        assert!(!record.deck_submitted);
        assert!(record.deck_link.is_none());
        assert!(!record.deck_reviewed);
        assert!(record.invariant_holds());
    }

    #[test]
    fn test_normalize_repairs_orphan_review() {
        let mut record = PlayerRecord {
            deck_reviewed: true,
            ..PlayerRecord::default()
        };
        assert!(!record.invariant_holds());
        record.normalize();
        assert!(record.invariant_holds());
        assert!(!record.deck_reviewed);
    }

    #[test]
    fn test_normalize_repairs_submitted_without_link() {
        let mut record = PlayerRecord {
            deck_submitted: true,
            deck_reviewed: true,
            ..PlayerRecord::default()
        };
        record.normalize();
        assert!(record.invariant_holds());
        assert!(!record.deck_submitted);
    }

    #[test]
    fn test_reset_keeps_nothing() {
        let mut record = PlayerRecord::admitted();
        record.set_display_name("Ari");
        record.accept_deck("https://x");
        record.reset();
        assert_eq!(record, PlayerRecord::new());
    }
}
