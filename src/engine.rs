use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::{Actor, AuthGate};
use crate::confirm::{parse_token, ClearPrompt, ConfirmationTable, TokenAction};
use crate::messages;
use crate::notify::{Notification, Notifier};
use crate::state::{PlayerRecord, Registry, RegistryStore};

/// Hosts we recognize as the expected deck archive. Only used to frame
/// announcements; any link is accepted as a submission.
const DECK_ARCHIVE_HOSTS: &[&str] = &["archive.piltover", "decks.piltover"];

pub fn looks_like_archive_link(link: &str) -> bool {
    DECK_ARCHIVE_HOSTS.iter().any(|host| link.contains(host))
}

/// Failure outcomes of lifecycle operations. Each maps to a distinct
/// user-facing message; none of them panics or escapes as a raw error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    #[error("actor is not privileged")]
    Unauthorized,

    #[error("player has not connected a display name")]
    NotConnected,

    #[error("player is not registered for the event")]
    NotRegistered,

    #[error("player has no submission on file")]
    NotSubmitted,

    #[error("no submissions channel is configured")]
    NoChannelConfigured,

    #[error("configured submissions channel no longer resolves")]
    InvalidChannel,

    #[error("channel is not a text channel")]
    WrongChannelType,

    #[error("confirmation response from a different user")]
    IdentityMismatch,

    #[error("confirmation prompt already resolved or expired")]
    PromptExpired,

    #[error("state could not be persisted")]
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOutcome {
    pub display_name: String,
    pub registered: bool,
    /// Whether a registration request was relayed to the announcement channel.
    pub announced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub display_name: String,
    pub link: String,
    pub looks_like_archive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllowOutcome {
    pub already_registered: bool,
}

/// Distinguishes "cleared something" from "there was nothing on file";
/// the latter is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Removed { had_submission: bool },
    NothingToRemove,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClearResolution {
    Cleared { players_dropped: usize },
    Cancelled,
}

/// The per-operation business rules: combines registry reads/writes with
/// gate checks and hands announcement payloads to the notifier.
///
/// One instance is process-wide state. The registry mutex is the single
/// mutual-exclusion boundary: every mutating operation locks it across its
/// whole read-modify-persist sequence, so concurrent interactions cannot
/// overwrite each other's changes.
pub struct LifecycleEngine {
    registry: Mutex<Registry>,
    store: RegistryStore,
    gate: AuthGate,
    notifier: Arc<dyn Notifier>,
    confirmations: ConfirmationTable,
}

pub type SharedEngine = Arc<LifecycleEngine>;

pub fn create_shared_engine(
    registry: Registry,
    store: RegistryStore,
    gate: AuthGate,
    notifier: Arc<dyn Notifier>,
) -> SharedEngine {
    Arc::new(LifecycleEngine::new(registry, store, gate, notifier))
}

impl LifecycleEngine {
    pub fn new(
        registry: Registry,
        store: RegistryStore,
        gate: AuthGate,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry: Mutex::new(registry),
            store,
            gate,
            notifier,
            confirmations: ConfirmationTable::new(),
        }
    }

    /// Persist the aggregate. On failure the in-memory mutation is kept and
    /// the caller sees `StoreUnavailable`; memory and disk re-converge on
    /// the next successful save.
    async fn persist(&self, registry: &Registry) -> Result<(), OpError> {
        self.store.save(registry).await.map_err(|e| {
            warn!("Failed to persist registry: {}", e);
            OpError::StoreUnavailable
        })
    }

    /// Record the actor's display name, creating their record on first
    /// contact. Re-connecting with the same name is a no-op rename.
    pub async fn connect(&self, actor: &Actor, display_name: &str) -> Result<ConnectOutcome, OpError> {
        let (registered, channel) = {
            let mut registry = self.registry.lock().await;
            let record = registry.get_or_create(&actor.identity);
            record.set_display_name(display_name);
            let registered = record.registered;
            let channel = registry.submissions_channel_id.clone();
            self.persist(&registry).await?;
            (registered, channel)
        };

        info!("Player {} connected as '{}'", actor.identity, display_name);

        // Unregistered players get flagged to staff so someone can approve
        // them. Best-effort; the rename above is already persisted.
        let mut announced = false;
        if !registered {
            if let Some(channel_id) = channel {
                self.notifier
                    .notify_channel(
                        &channel_id,
                        Notification::RegistrationRequest {
                            actor_identity: actor.identity.clone(),
                            display_name: display_name.to_string(),
                        },
                    )
                    .await;
                announced = true;
            }
        }

        Ok(ConnectOutcome {
            display_name: display_name.to_string(),
            registered,
            announced,
        })
    }

    /// Submit preconditions against a locked registry. Returns the
    /// configured channel and the player's display name.
    fn submit_preconditions(
        registry: &Registry,
        actor: &Actor,
    ) -> Result<(String, String), OpError> {
        let channel_id = registry
            .submissions_channel_id
            .clone()
            .ok_or(OpError::NoChannelConfigured)?;

        let record = registry.get(&actor.identity).ok_or(OpError::NotConnected)?;
        if !record.is_connected() {
            return Err(OpError::NotConnected);
        }
        if !record.registered {
            return Err(OpError::NotRegistered);
        }
        let display_name = record
            .display_name
            .clone()
            .unwrap_or_else(|| actor.identity.clone());

        Ok((channel_id, display_name))
    }

    /// Accept a decklist submission and relay it to the announcement
    /// channel. The relay failing does not undo the submission.
    pub async fn submit(&self, actor: &Actor, link: &str) -> Result<SubmitOutcome, OpError> {
        // First pass: read the configured channel without mutating anything.
        let (channel_id, _) = {
            let registry = self.registry.lock().await;
            Self::submit_preconditions(&registry, actor)?
        };

        // Resolve the channel outside the lock, so a slow platform call
        // cannot stall unrelated operations.
        if !self.notifier.channel_exists(&channel_id).await {
            return Err(OpError::InvalidChannel);
        }

        // Second pass: re-check everything under the lock, then mutate.
        // If the channel was swapped between the two locks the resolution
        // above is stale; the relay below is best-effort, so that is
        // harmless.
        let mut registry = self.registry.lock().await;
        let (channel_id, display_name) = Self::submit_preconditions(&registry, actor)?;
        registry.get_or_create(&actor.identity).accept_deck(link);
        self.persist(&registry).await?;
        drop(registry);

        info!("Player {} submitted a decklist", actor.identity);

        let outcome = SubmitOutcome {
            display_name: display_name.clone(),
            link: link.to_string(),
            looks_like_archive: looks_like_archive_link(link),
        };
        self.notifier
            .notify_channel(
                &channel_id,
                Notification::Submission {
                    actor_identity: actor.identity.clone(),
                    display_name,
                    link: link.to_string(),
                    looks_like_archive: outcome.looks_like_archive,
                },
            )
            .await;

        Ok(outcome)
    }

    /// Point announcements at a channel. `text_capable` is determined by
    /// the command layer from the platform's channel kind.
    pub async fn set_submissions_channel(
        &self,
        actor: &Actor,
        channel_id: &str,
        text_capable: bool,
    ) -> Result<(), OpError> {
        if !self.gate.is_privileged(actor) {
            return Err(OpError::Unauthorized);
        }
        if !text_capable {
            return Err(OpError::WrongChannelType);
        }

        let mut registry = self.registry.lock().await;
        registry.submissions_channel_id = Some(channel_id.to_string());
        self.persist(&registry).await?;

        info!("Submissions channel set to {} by {}", channel_id, actor.identity);
        Ok(())
    }

    /// Admit a player to the event.
    pub async fn allow(&self, actor: &Actor, target: &str) -> Result<AllowOutcome, OpError> {
        if !self.gate.is_privileged(actor) {
            return Err(OpError::Unauthorized);
        }

        let already_registered = {
            let mut registry = self.registry.lock().await;
            let record = registry.get_or_create(target);
            let already = record.registered;
            record.set_registered(true);
            self.persist(&registry).await?;
            already
        };

        info!("Player {} admitted by {}", target, actor.identity);
        self.notifier
            .notify_user(target, messages::approved_dm())
            .await;

        Ok(AllowOutcome { already_registered })
    }

    /// Revoke a player's admission and drop any submission on file. The
    /// identity stays in the registry with default fields.
    pub async fn remove(&self, actor: &Actor, target: &str) -> Result<RemoveOutcome, OpError> {
        if !self.gate.is_privileged(actor) {
            return Err(OpError::Unauthorized);
        }

        let outcome = {
            let mut registry = self.registry.lock().await;
            let record = registry.get_or_create(target);
            let outcome = if record.is_blank() {
                RemoveOutcome::NothingToRemove
            } else {
                let had_submission = record.deck_submitted;
                record.set_registered(false);
                record.clear_deck();
                RemoveOutcome::Removed { had_submission }
            };
            self.persist(&registry).await?;
            outcome
        };

        if let RemoveOutcome::Removed { .. } = outcome {
            info!("Player {} removed by {}", target, actor.identity);
            self.notifier
                .notify_user(target, messages::removed_dm())
                .await;
        }

        Ok(outcome)
    }

    /// Flag the target's current submission as reviewed (or not).
    pub async fn mark_reviewed(
        &self,
        actor: &Actor,
        target: &str,
        reviewed: bool,
    ) -> Result<(), OpError> {
        if !self.gate.is_privileged(actor) {
            return Err(OpError::Unauthorized);
        }

        let mut registry = self.registry.lock().await;
        let record = registry
            .players
            .get_mut(target)
            .filter(|r| r.deck_submitted)
            .ok_or(OpError::NotSubmitted)?;
        record.set_reviewed(reviewed);
        self.persist(&registry).await?;

        info!(
            "Submission of {} marked reviewed={} by {}",
            target, reviewed, actor.identity
        );
        Ok(())
    }

    /// Snapshot of every player record, in registry insertion order.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<(String, PlayerRecord)>, OpError> {
        if !self.gate.is_privileged(actor) {
            return Err(OpError::Unauthorized);
        }

        let registry = self.registry.lock().await;
        Ok(registry
            .players
            .iter()
            .map(|(identity, record)| (identity.clone(), record.clone()))
            .collect())
    }

    /// A player's own record; absent identities read as a default record
    /// without allocating one.
    pub async fn status(&self, actor: &Actor) -> PlayerRecord {
        let registry = self.registry.lock().await;
        registry.get(&actor.identity).cloned().unwrap_or_default()
    }

    /// Start the two-step bulk-clear flow. No state is mutated until the
    /// prompt is confirmed via [`resolve_clear`](Self::resolve_clear).
    pub async fn begin_clear(&self, actor: &Actor) -> Result<ClearPrompt, OpError> {
        if !self.gate.is_privileged(actor) {
            return Err(OpError::Unauthorized);
        }
        self.confirmations.cleanup_stale();
        Ok(self.confirmations.begin(&actor.identity))
    }

    /// Resolve a bulk-clear prompt from a response token.
    ///
    /// The responder must be the actor bound into the token and must still
    /// be privileged at resolution time. A rejected attempt leaves the
    /// prompt pending for the rightful actor; a resolved prompt cannot be
    /// resolved again.
    pub async fn resolve_clear(
        &self,
        responder: &Actor,
        token: &str,
    ) -> Result<ClearResolution, OpError> {
        let parsed = parse_token(token).ok_or(OpError::PromptExpired)?;

        let initiator = self
            .confirmations
            .pending_actor(parsed.nonce)
            .ok_or(OpError::PromptExpired)?;
        // The identity embedded in the token must agree with both the table
        // entry and the responder; a tampered token never resolves a prompt.
        if parsed.actor_identity != initiator || responder.identity != initiator {
            return Err(OpError::IdentityMismatch);
        }
        // Privilege is re-checked at resolution time, not cached from the
        // prompt.
        if !self.gate.is_privileged(responder) {
            return Err(OpError::Unauthorized);
        }

        match parsed.action {
            TokenAction::Cancel => {
                if !self.confirmations.complete(parsed.nonce) {
                    return Err(OpError::PromptExpired);
                }
                info!("Bulk clear cancelled by {}", responder.identity);
                Ok(ClearResolution::Cancelled)
            }
            TokenAction::Confirm => {
                let mut registry = self.registry.lock().await;
                if !self.confirmations.complete(parsed.nonce) {
                    return Err(OpError::PromptExpired);
                }
                let players_dropped = registry.player_count();
                registry.clear_players();
                self.persist(&registry).await?;

                info!(
                    "Bulk clear confirmed by {}: dropped {} players",
                    responder.identity, players_dropped
                );
                Ok(ClearResolution::Cleared { players_dropped })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notification;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubNotifier {
        channel_missing: AtomicBool,
        channel_checks: AtomicUsize,
        channel_notes: std::sync::Mutex<Vec<(String, Notification)>>,
        dms: std::sync::Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        async fn channel_exists(&self, _channel_id: &str) -> bool {
            self.channel_checks.fetch_add(1, Ordering::SeqCst);
            !self.channel_missing.load(Ordering::SeqCst)
        }

        async fn notify_channel(&self, channel_id: &str, notification: Notification) {
            self.channel_notes
                .lock()
                .unwrap()
                .push((channel_id.to_string(), notification));
        }

        async fn notify_user(&self, user_identity: &str, message: String) {
            self.dms
                .lock()
                .unwrap()
                .push((user_identity.to_string(), message));
        }
    }

    fn temp_store() -> RegistryStore {
        let path = std::env::temp_dir().join(format!("deckhand-engine-{}.json", uuid::Uuid::new_v4()));
        RegistryStore::new(path.to_string_lossy().to_string())
    }

    fn test_engine() -> (LifecycleEngine, Arc<StubNotifier>) {
        let notifier = Arc::new(StubNotifier::default());
        let gate = AuthGate::new(vec!["staff".to_string()]);
        let engine = LifecycleEngine::new(Registry::new(), temp_store(), gate, notifier.clone());
        (engine, notifier)
    }

    fn player(id: &str) -> Actor {
        Actor::new(id)
    }

    fn staff(id: &str) -> Actor {
        let mut actor = Actor::new(id);
        actor.roles = vec!["staff".to_string()];
        actor
    }

    #[test]
    fn test_archive_link_classification() {
        assert!(looks_like_archive_link("https://archive.piltover/deck/12"));
        assert!(!looks_like_archive_link("https://pastebin.example/raw/12"));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (engine, _) = test_engine();
        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();
        let first = engine.status(&actor).await;
        engine.connect(&actor, "Ari").await.unwrap();
        let second = engine.status(&actor).await;
        assert_eq!(first, second);
        assert_eq!(second.display_name.as_deref(), Some("Ari"));
        assert!(!second.registered);
    }

    #[tokio::test]
    async fn test_connect_announces_registration_request() {
        let (engine, notifier) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();

        let outcome = engine.connect(&player("u1"), "Ari").await.unwrap();
        assert!(outcome.announced);

        let notes = notifier.channel_notes.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "42");
        assert!(matches!(
            notes[0].1,
            Notification::RegistrationRequest { ref actor_identity, .. } if actor_identity == "u1"
        ));
    }

    #[tokio::test]
    async fn test_submit_without_channel_leaves_registry_unchanged() {
        let (engine, notifier) = test_engine();
        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();

        let err = engine.submit(&actor, "https://x").await.unwrap_err();
        assert_eq!(err, OpError::NoChannelConfigured);

        let record = engine.status(&actor).await;
        assert!(!record.deck_submitted);
        assert!(record.deck_link.is_none());
        assert!(notifier.channel_notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_requires_connect_then_registration() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();

        let actor = player("u1");
        let err = engine.submit(&actor, "https://x").await.unwrap_err();
        assert_eq!(err, OpError::NotConnected);

        engine.connect(&actor, "Ari").await.unwrap();
        let err = engine.submit(&actor, "https://x").await.unwrap_err();
        assert_eq!(err, OpError::NotRegistered);
    }

    #[tokio::test]
    async fn test_submit_happy_path_notifies_once() {
        let (engine, notifier) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();

        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();
        engine.allow(&mod_actor, "u1").await.unwrap();

        let outcome = engine
            .submit(&actor, "https://archive.piltover/x")
            .await
            .unwrap();
        assert!(outcome.looks_like_archive);
        assert_eq!(outcome.display_name, "Ari");

        let record = engine.status(&actor).await;
        assert!(record.deck_submitted);
        assert!(!record.deck_reviewed);

        let notes = notifier.channel_notes.lock().unwrap();
        let submissions: Vec<_> = notes
            .iter()
            .filter(|(_, n)| matches!(n, Notification::Submission { .. }))
            .collect();
        assert_eq!(submissions.len(), 1);
        assert!(matches!(
            submissions[0].1,
            Notification::Submission { ref actor_identity, .. } if actor_identity == "u1"
        ));
    }

    #[tokio::test]
    async fn test_submit_with_unresolvable_channel_fails_clean() {
        let (engine, notifier) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();
        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();
        engine.allow(&mod_actor, "u1").await.unwrap();

        notifier.channel_missing.store(true, Ordering::SeqCst);
        let err = engine.submit(&actor, "https://x").await.unwrap_err();
        assert_eq!(err, OpError::InvalidChannel);
        assert!(!engine.status(&actor).await.deck_submitted);
    }

    #[tokio::test]
    async fn test_submit_resolves_channel_once_per_attempt() {
        let (engine, notifier) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();
        let actor = player("u1");

        // Failed preconditions never reach channel resolution.
        engine.submit(&actor, "https://x").await.unwrap_err();
        assert_eq!(notifier.channel_checks.load(Ordering::SeqCst), 0);

        engine.connect(&actor, "Ari").await.unwrap();
        engine.allow(&mod_actor, "u1").await.unwrap();
        engine.submit(&actor, "https://x").await.unwrap();
        assert_eq!(notifier.channel_checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resubmission_resets_review() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();
        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();
        engine.allow(&mod_actor, "u1").await.unwrap();

        engine.submit(&actor, "https://x/1").await.unwrap();
        engine.mark_reviewed(&mod_actor, "u1", true).await.unwrap();
        assert!(engine.status(&actor).await.deck_reviewed);

        engine.submit(&actor, "https://x/2").await.unwrap();
        let record = engine.status(&actor).await;
        assert!(!record.deck_reviewed);
        assert_eq!(record.deck_link.as_deref(), Some("https://x/2"));
    }

    #[tokio::test]
    async fn test_privileged_operations_reject_plain_actors() {
        let (engine, _) = test_engine();
        let actor = player("u1");

        assert_eq!(
            engine
                .set_submissions_channel(&actor, "42", true)
                .await
                .unwrap_err(),
            OpError::Unauthorized
        );
        assert_eq!(
            engine.allow(&actor, "u2").await.unwrap_err(),
            OpError::Unauthorized
        );
        assert_eq!(
            engine.remove(&actor, "u2").await.unwrap_err(),
            OpError::Unauthorized
        );
        assert_eq!(
            engine.mark_reviewed(&actor, "u2", true).await.unwrap_err(),
            OpError::Unauthorized
        );
        assert_eq!(engine.list(&actor).await.unwrap_err(), OpError::Unauthorized);
        assert_eq!(
            engine.begin_clear(&actor).await.unwrap_err(),
            OpError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_set_channel_rejects_non_text_destination() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");

        let err = engine
            .set_submissions_channel(&mod_actor, "42", false)
            .await
            .unwrap_err();
        assert_eq!(err, OpError::WrongChannelType);

        // The channel stays unconfigured, so submissions are still closed.
        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();
        engine.allow(&mod_actor, "u1").await.unwrap();
        assert_eq!(
            engine.submit(&actor, "https://x").await.unwrap_err(),
            OpError::NoChannelConfigured
        );
    }

    #[tokio::test]
    async fn test_elevated_permission_passes_gate() {
        let (engine, _) = test_engine();
        let mut admin = player("a1");
        admin.has_elevated_permission = true;
        assert!(engine.list(&admin).await.is_ok());
    }

    #[tokio::test]
    async fn test_allow_notifies_target() {
        let (engine, notifier) = test_engine();
        engine.allow(&staff("m1"), "u1").await.unwrap();
        let dms = notifier.dms.lock().unwrap();
        assert_eq!(dms.len(), 1);
        assert_eq!(dms[0].0, "u1");
    }

    #[tokio::test]
    async fn test_remove_never_seen_identity_is_not_an_error() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        let outcome = engine.remove(&mod_actor, "u1").await.unwrap();
        assert_eq!(outcome, RemoveOutcome::NothingToRemove);

        // The identity now exists with all-default fields.
        let listing = engine.list(&mod_actor).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].0, "u1");
        assert_eq!(listing[0].1, PlayerRecord::new());
    }

    #[tokio::test]
    async fn test_remove_clears_registration_and_deck() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        engine
            .set_submissions_channel(&mod_actor, "42", true)
            .await
            .unwrap();
        let actor = player("u1");
        engine.connect(&actor, "Ari").await.unwrap();
        engine.allow(&mod_actor, "u1").await.unwrap();
        engine.submit(&actor, "https://x").await.unwrap();

        let outcome = engine.remove(&mod_actor, "u1").await.unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed { had_submission: true });

        let record = engine.status(&actor).await;
        assert!(!record.registered);
        assert!(record.deck_link.is_none());
        assert!(!record.deck_submitted);
        assert!(!record.deck_reviewed);
        // Display name survives a remove.
        assert_eq!(record.display_name.as_deref(), Some("Ari"));
    }

    #[tokio::test]
    async fn test_mark_reviewed_requires_submission() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        engine.allow(&mod_actor, "u1").await.unwrap();
        let err = engine
            .mark_reviewed(&mod_actor, "u1", true)
            .await
            .unwrap_err();
        assert_eq!(err, OpError::NotSubmitted);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        engine.connect(&player("u2"), "B").await.unwrap();
        engine.connect(&player("u1"), "A").await.unwrap();
        engine.connect(&player("u3"), "C").await.unwrap();

        let listing = engine.list(&mod_actor).await.unwrap();
        let order: Vec<&str> = listing.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["u2", "u1", "u3"]);
    }

    #[tokio::test]
    async fn test_clear_confirmation_binds_to_initiator() {
        let (engine, _) = test_engine();
        let mod_a = staff("m1");
        let mod_b = staff("m2");
        engine.connect(&player("u1"), "Ari").await.unwrap();

        let prompt = engine.begin_clear(&mod_a).await.unwrap();

        // A different privileged mod cannot resolve someone else's prompt.
        let err = engine
            .resolve_clear(&mod_b, &prompt.confirm_token)
            .await
            .unwrap_err();
        assert_eq!(err, OpError::IdentityMismatch);
        assert_eq!(engine.list(&mod_a).await.unwrap().len(), 1);

        // The prompt is still pending for the rightful actor.
        let resolution = engine
            .resolve_clear(&mod_a, &prompt.confirm_token)
            .await
            .unwrap();
        assert_eq!(resolution, ClearResolution::Cleared { players_dropped: 1 });
        assert!(engine.list(&mod_a).await.unwrap().is_empty());

        // Terminal-state re-entry is rejected.
        let err = engine
            .resolve_clear(&mod_a, &prompt.confirm_token)
            .await
            .unwrap_err();
        assert_eq!(err, OpError::PromptExpired);
    }

    #[tokio::test]
    async fn test_clear_rejects_tampered_token() {
        let (engine, _) = test_engine();
        let mod_a = staff("m1");
        let mod_b = staff("m2");
        engine.connect(&player("u1"), "Ari").await.unwrap();

        let prompt = engine.begin_clear(&mod_a).await.unwrap();

        // A token rewritten to name a different actor must not resolve the
        // prompt, even when that actor is privileged.
        let forged = format!("clearall:confirm:m2:{}", prompt.nonce);
        let err = engine.resolve_clear(&mod_b, &forged).await.unwrap_err();
        assert_eq!(err, OpError::IdentityMismatch);
        assert_eq!(engine.list(&mod_a).await.unwrap().len(), 1);

        // The genuine token still works for the rightful actor.
        let resolution = engine
            .resolve_clear(&mod_a, &prompt.confirm_token)
            .await
            .unwrap();
        assert_eq!(resolution, ClearResolution::Cleared { players_dropped: 1 });
    }

    #[tokio::test]
    async fn test_clear_privilege_rechecked_at_resolution() {
        let notifier = Arc::new(StubNotifier::default());
        let gate = AuthGate::new(vec!["staff".to_string()]);
        let engine = LifecycleEngine::new(Registry::new(), temp_store(), gate, notifier);

        let mod_actor = staff("m1");
        let prompt = engine.begin_clear(&mod_actor).await.unwrap();

        // Same identity, but the role was taken away in the meantime.
        let demoted = player("m1");
        let err = engine
            .resolve_clear(&demoted, &prompt.confirm_token)
            .await
            .unwrap_err();
        assert_eq!(err, OpError::Unauthorized);

        // Prompt stays pending; the still-privileged actor may cancel it.
        let resolution = engine
            .resolve_clear(&mod_actor, &prompt.cancel_token)
            .await
            .unwrap();
        assert_eq!(resolution, ClearResolution::Cancelled);
    }

    #[tokio::test]
    async fn test_clear_cancel_mutates_nothing() {
        let (engine, _) = test_engine();
        let mod_actor = staff("m1");
        engine.connect(&player("u1"), "Ari").await.unwrap();

        let prompt = engine.begin_clear(&mod_actor).await.unwrap();
        let resolution = engine
            .resolve_clear(&mod_actor, &prompt.cancel_token)
            .await
            .unwrap();
        assert_eq!(resolution, ClearResolution::Cancelled);
        assert_eq!(engine.list(&mod_actor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_in_memory_mutation() {
        let notifier = Arc::new(StubNotifier::default());
        let gate = AuthGate::new(vec!["staff".to_string()]);
        let broken_store = RegistryStore::new("/nonexistent/deckhand-test/state.json");
        let engine = LifecycleEngine::new(Registry::new(), broken_store, gate, notifier);

        let actor = player("u1");
        let err = engine.connect(&actor, "Ari").await.unwrap_err();
        assert_eq!(err, OpError::StoreUnavailable);

        // Accepted divergence: the mutation stays applied in memory.
        let record = engine.status(&actor).await;
        assert_eq!(record.display_name.as_deref(), Some("Ari"));
    }
}
