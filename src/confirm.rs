use dashmap::DashMap;
use uuid::Uuid;

const TOKEN_PREFIX: &str = "clearall";

/// Which way a confirmation token resolves the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    Confirm,
    Cancel,
}

/// A confirmation token decoded from a component interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    pub action: TokenAction,
    pub actor_identity: String,
    pub nonce: Uuid,
}

/// The pair of tokens handed back when a bulk-clear prompt is issued.
#[derive(Debug, Clone)]
pub struct ClearPrompt {
    pub actor_identity: String,
    pub nonce: Uuid,
    pub confirm_token: String,
    pub cancel_token: String,
}

/// Encode `{action, initiating identity, nonce}` as an opaque token that
/// fits in a button custom ID.
fn encode_token(action: TokenAction, actor_identity: &str, nonce: Uuid) -> String {
    let verb = match action {
        TokenAction::Confirm => "confirm",
        TokenAction::Cancel => "cancel",
    };
    format!("{}:{}:{}:{}", TOKEN_PREFIX, verb, actor_identity, nonce)
}

/// Decode a token, returning `None` for anything that is not one of ours.
pub fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(4, ':');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let action = match parts.next()? {
        "confirm" => TokenAction::Confirm,
        "cancel" => TokenAction::Cancel,
        _ => return None,
    };
    let actor_identity = parts.next()?.to_string();
    let nonce = parts.next()?.parse().ok()?;
    Some(ParsedToken {
        action,
        actor_identity,
        nonce,
    })
}

#[derive(Debug, Clone)]
struct PendingClear {
    actor_identity: String,
    started_at: u64,
}

/// Outstanding bulk-clear prompts, keyed by nonce so each prompt resolves
/// at most once. A rejected resolution attempt (wrong responder, lost
/// privilege) leaves the prompt pending for the rightful actor.
#[derive(Debug, Default)]
pub struct ConfirmationTable {
    pending: DashMap<Uuid, PendingClear>,
}

impl ConfirmationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new prompt bound to the initiating actor.
    pub fn begin(&self, actor_identity: &str) -> ClearPrompt {
        let nonce = Uuid::new_v4();
        self.pending.insert(
            nonce,
            PendingClear {
                actor_identity: actor_identity.to_string(),
                started_at: current_timestamp(),
            },
        );
        ClearPrompt {
            actor_identity: actor_identity.to_string(),
            nonce,
            confirm_token: encode_token(TokenAction::Confirm, actor_identity, nonce),
            cancel_token: encode_token(TokenAction::Cancel, actor_identity, nonce),
        }
    }

    /// Identity the prompt is bound to, if it is still open.
    pub fn pending_actor(&self, nonce: Uuid) -> Option<String> {
        self.pending.get(&nonce).map(|p| p.actor_identity.clone())
    }

    /// Close a prompt. Returns false if it was already resolved.
    pub fn complete(&self, nonce: Uuid) -> bool {
        self.pending.remove(&nonce).is_some()
    }

    /// Drop prompts older than an hour; their buttons have long expired.
    pub fn cleanup_stale(&self) {
        let one_hour_ago = current_timestamp().saturating_sub(3600);
        self.pending.retain(|_, v| v.started_at > one_hour_ago);
    }
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
