use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::messages;

/// Payload relayed to the announcement channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A player submitted a decklist.
    Submission {
        actor_identity: String,
        display_name: String,
        link: String,
        /// Non-authoritative classification, used only for framing the
        /// announcement. Never gates acceptance.
        looks_like_archive: bool,
    },
    /// A connected player is waiting for staff approval.
    RegistrationRequest {
        actor_identity: String,
        display_name: String,
    },
}

/// Outbound side channels: the announcement relay and direct messages.
///
/// Everything here is fire-and-forget. Implementations swallow delivery
/// failures; a failed notification never rolls back a persisted mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether a channel identity still resolves to a text-capable
    /// destination. The only notifier call whose answer the engine acts on.
    async fn channel_exists(&self, channel_id: &str) -> bool;

    /// Relay a notification to the announcement channel.
    async fn notify_channel(&self, channel_id: &str, notification: Notification);

    /// Send a direct message to a user.
    async fn notify_user(&self, user_identity: &str, message: String);
}

/// Discord-backed notifier used by the running bot.
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    fn parse_channel(channel_id: &str) -> Option<serenity::ChannelId> {
        channel_id.parse::<u64>().ok().map(serenity::ChannelId::new)
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn channel_exists(&self, channel_id: &str) -> bool {
        let Some(id) = Self::parse_channel(channel_id) else {
            return false;
        };
        match self.http.get_channel(id).await {
            Ok(serenity::Channel::Guild(channel)) => matches!(
                channel.kind,
                serenity::ChannelType::Text | serenity::ChannelType::News
            ),
            Ok(_) => false,
            Err(e) => {
                debug!("Channel {} did not resolve: {}", channel_id, e);
                false
            }
        }
    }

    async fn notify_channel(&self, channel_id: &str, notification: Notification) {
        let Some(id) = Self::parse_channel(channel_id) else {
            warn!("Cannot announce to malformed channel ID '{}'", channel_id);
            return;
        };

        let embed = messages::notification_embed(&notification);
        let message = serenity::CreateMessage::new().embed(embed);
        if let Err(e) = id.send_message(&self.http, message).await {
            warn!("Failed to announce to channel {}: {}", channel_id, e);
        }
    }

    async fn notify_user(&self, user_identity: &str, message: String) {
        let Ok(raw_id) = user_identity.parse::<u64>() else {
            warn!("Cannot DM malformed user ID '{}'", user_identity);
            return;
        };
        let user_id = serenity::UserId::new(raw_id);

        match user_id.create_dm_channel(&self.http).await {
            Ok(dm_channel) => {
                if let Err(e) = dm_channel
                    .send_message(&self.http, serenity::CreateMessage::new().content(message))
                    .await
                {
                    warn!("Failed to DM user {}: {}", user_identity, e);
                }
            }
            Err(e) => {
                warn!("Failed to open DM channel for {}: {}", user_identity, e);
            }
        }
    }
}
