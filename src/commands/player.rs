use tracing::info;

use crate::commands::actor_from_ctx;
use crate::messages;
use crate::{Context, Error};

/// Trimmed display name, or `None` when nothing usable is left.
fn normalized_name(raw: &str) -> Option<&str> {
    let name = raw.trim();
    (!name.is_empty()).then_some(name)
}

/// Tell me your community name
///
/// Connects your Discord account to your name in the event community.
/// Required before you can submit a decklist.
#[poise::command(slash_command)]
pub async fn connect(
    ctx: Context<'_>,
    #[description = "Your name in the event community"] name: String,
) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let engine = &ctx.data().engine;

    let reply = match normalized_name(&name) {
        None => messages::empty_name_reply(),
        Some(name) => match engine.connect(&actor, name).await {
            Ok(outcome) => messages::connect_reply(&outcome),
            Err(e) => messages::op_error_message(&e),
        },
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Submit your decklist link
///
/// Overwrites any earlier submission and resets its review status. The
/// submission is announced in the configured staff channel.
#[poise::command(slash_command)]
pub async fn submit(
    ctx: Context<'_>,
    #[description = "Link to your decklist"] link: String,
) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let engine = &ctx.data().engine;

    let reply = match engine.submit(&actor, link.trim()).await {
        Ok(outcome) => {
            info!("Accepted submission from {}", ctx.author().name);
            messages::submit_reply(&outcome)
        }
        Err(e) => messages::op_error_message(&e),
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Show your own registration and submission status
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let record = ctx.data().engine.status(&actor).await;

    let embed = messages::status_embed(&actor.identity, &record);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_name_trims_and_rejects_empty() {
        assert_eq!(normalized_name("  Ari  "), Some("Ari"));
        assert_eq!(normalized_name("Ari"), Some("Ari"));
        assert_eq!(normalized_name(""), None);
        assert_eq!(normalized_name("   "), None);
        assert_eq!(normalized_name("\t\n"), None);
    }
}
