use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{BotError, Result};
use crate::state::PlayerRecord;

/// Current on-disk schema generation.
pub const SCHEMA_VERSION: u32 = 3;

/// The full persisted aggregate: event configuration plus every player
/// record for the current event. Loaded once at startup and written back
/// after every mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    /// Schema version for migrations.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Destination channel for submission/registration announcements.
    /// `None` means submissions are disabled.
    #[serde(default)]
    pub submissions_channel_id: Option<String>,

    /// Map of player identity to record, in insertion order. Required when
    /// decoding so legacy documents fall through to the migration decoders.
    pub players: IndexMap<String, PlayerRecord>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            submissions_channel_id: None,
            players: IndexMap::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a player, allocating a default record on first interaction.
    /// This is the only place records are constructed for live identities.
    pub fn get_or_create(&mut self, identity: &str) -> &mut PlayerRecord {
        self.players
            .entry(identity.to_string())
            .or_insert_with(PlayerRecord::new)
    }

    pub fn get(&self, identity: &str) -> Option<&PlayerRecord> {
        self.players.get(identity)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Drop every player record. Only the bulk-clear operation calls this.
    pub fn clear_players(&mut self) {
        self.players = IndexMap::new();
    }

    /// Repair deck invariants on every record, used after decoding
    /// documents we did not write ourselves.
    fn normalize(&mut self) {
        for record in self.players.values_mut() {
            record.normalize();
        }
        self.version = SCHEMA_VERSION;
    }
}

/// Generation 1: a single map of admitted identities.
#[derive(Debug, Deserialize)]
struct AllowedMapDoc {
    allowed_users: BTreeMap<String, bool>,
}

/// Generation 2: separate pending and allowed identity lists.
#[derive(Debug, Deserialize)]
struct TwoListDoc {
    #[serde(default)]
    pending: Vec<String>,
    allowed: Vec<String>,
    #[serde(default)]
    submissions_channel_id: Option<String>,
}

/// Decode a state document of any known generation into the current shape.
///
/// Decoder chain: current shape first, then each legacy generation, newest
/// to oldest. Returns `None` when no decoder accepts the document.
pub(crate) fn decode_document(content: &str) -> Option<Registry> {
    if let Ok(mut registry) = serde_json::from_str::<Registry>(content) {
        registry.normalize();
        return Some(registry);
    }

    if let Ok(doc) = serde_json::from_str::<TwoListDoc>(content) {
        info!(
            "Migrating state from pending/allowed lists ({} allowed, {} pending)",
            doc.allowed.len(),
            doc.pending.len()
        );
        let mut registry = Registry::new();
        registry.submissions_channel_id = doc.submissions_channel_id;
        for identity in doc.allowed {
            registry.players.insert(identity, PlayerRecord::admitted());
        }
        for identity in doc.pending {
            registry
                .players
                .entry(identity)
                .or_insert_with(PlayerRecord::new);
        }
        return Some(registry);
    }

    if let Ok(doc) = serde_json::from_str::<AllowedMapDoc>(content) {
        info!(
            "Migrating state from allowed-users map ({} entries)",
            doc.allowed_users.len()
        );
        let mut registry = Registry::new();
        for (identity, admitted) in doc.allowed_users {
            let record = if admitted {
                PlayerRecord::admitted()
            } else {
                PlayerRecord::new()
            };
            registry.players.insert(identity, record);
        }
        return Some(registry);
    }

    None
}

/// Durable JSON persistence for the registry.
///
/// `load` never fails: an unreadable or undecodable document degrades to
/// the empty default registry rather than blocking startup. `save` writes
/// the whole aggregate atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: String,
}

impl RegistryStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Registry {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match decode_document(&content) {
                Some(registry) => {
                    info!(
                        "Loaded registry from {} ({} players)",
                        self.path,
                        registry.player_count()
                    );
                    registry
                }
                None => {
                    warn!(
                        "State file {} did not match any known schema, starting empty",
                        self.path
                    );
                    Registry::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting empty", self.path);
                Registry::new()
            }
            Err(e) => {
                warn!("Could not read state file {}: {}, starting empty", self.path, e);
                Registry::new()
            }
        }
    }

    pub async fn save(&self, registry: &Registry) -> Result<()> {
        let content =
            serde_json::to_string_pretty(registry).map_err(|e| BotError::StateSerialize {
                path: self.path.clone(),
                source: e,
            })?;

        // Write to temp file first, then rename for atomicity
        let temp_path = format!("{}.tmp", self.path);
        tokio::fs::write(&temp_path, &content).await.map_err(|e| {
            BotError::StateSave {
                path: self.path.clone(),
                source: e,
            }
        })?;

        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            BotError::StateSave {
                path: self.path.clone(),
                source: e,
            }
        })?;

        Ok(())
    }
}
