use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::commands::{actor_from_component, actor_from_ctx};
use crate::engine::OpError;
use crate::messages;
use crate::{Context, Error};

/// Set the submissions announcement channel (Staff)
///
/// Submissions and registration requests are announced in this channel.
#[poise::command(slash_command, guild_only)]
pub async fn setchannel(
    ctx: Context<'_>,
    #[description = "Text channel to announce submissions in"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let engine = &ctx.data().engine;

    let text_capable = matches!(
        channel.kind,
        serenity::ChannelType::Text | serenity::ChannelType::News
    );

    let reply = match engine
        .set_submissions_channel(&actor, &channel.id.to_string(), text_capable)
        .await
    {
        Ok(()) => format!("✅ Submissions will be announced in <#{}>.", channel.id),
        Err(e) => messages::op_error_message(&e),
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Admit a player to the event (Staff)
#[poise::command(slash_command, guild_only)]
pub async fn allow(
    ctx: Context<'_>,
    #[description = "Player to admit"] user: serenity::User,
) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let target = user.id.to_string();

    let reply = match ctx.data().engine.allow(&actor, &target).await {
        Ok(outcome) => messages::allow_reply(&target, &outcome),
        Err(e) => messages::op_error_message(&e),
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Remove a player from the event (Staff)
///
/// Revokes their admission and discards any submission. The player can be
/// admitted again later.
#[poise::command(slash_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Player to remove"] user: serenity::User,
) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let target = user.id.to_string();

    let reply = match ctx.data().engine.remove(&actor, &target).await {
        Ok(outcome) => messages::remove_reply(&target, &outcome),
        Err(e) => messages::op_error_message(&e),
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Mark a player's submission as reviewed (Staff)
#[poise::command(slash_command, guild_only)]
pub async fn review(
    ctx: Context<'_>,
    #[description = "Player whose submission was reviewed"] user: serenity::User,
    #[description = "Reviewed state, defaults to true"] reviewed: Option<bool>,
) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let target = user.id.to_string();
    let reviewed = reviewed.unwrap_or(true);

    let reply = match ctx
        .data()
        .engine
        .mark_reviewed(&actor, &target, reviewed)
        .await
    {
        Ok(()) => messages::review_reply(&target, reviewed),
        Err(e) => messages::op_error_message(&e),
    };

    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// List all players and their status (Staff)
#[poise::command(slash_command, guild_only)]
pub async fn players(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;

    let reply = match ctx.data().engine.list(&actor).await {
        Ok(listing) => poise::CreateReply::default()
            .embed(messages::player_list_embed(&listing))
            .ephemeral(true),
        Err(e) => poise::CreateReply::default()
            .content(messages::op_error_message(&e))
            .ephemeral(true),
    };

    ctx.send(reply).await?;
    Ok(())
}

/// Clear all player data for a fresh event (Staff)
///
/// Asks for confirmation first. Only the staff member who started the
/// prompt can confirm or cancel it.
#[poise::command(slash_command, guild_only)]
pub async fn clearall(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor_from_ctx(&ctx).await;
    let engine = &ctx.data().engine;

    let player_count = match engine.list(&actor).await {
        Ok(listing) => listing.len(),
        Err(e) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(messages::op_error_message(&e))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    let prompt = match engine.begin_clear(&actor).await {
        Ok(prompt) => prompt,
        Err(e) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(messages::op_error_message(&e))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    info!(
        "Bulk clear prompt issued to {} ({} players on file)",
        ctx.author().name,
        player_count
    );

    let buttons = vec![
        serenity::CreateButton::new(prompt.confirm_token.clone())
            .label("Clear everything")
            .style(serenity::ButtonStyle::Danger),
        serenity::CreateButton::new(prompt.cancel_token.clone())
            .label("Cancel")
            .style(serenity::ButtonStyle::Secondary),
    ];

    let reply = ctx
        .send(
            poise::CreateReply::default()
                .content(messages::clear_prompt_text(player_count))
                .components(vec![serenity::CreateActionRow::Buttons(buttons)])
                .ephemeral(true),
        )
        .await?;

    // Wait for button interaction
    let message = reply.message().await?;

    while let Some(interaction) = message
        .await_component_interaction(ctx.serenity_context().shard.clone())
        .timeout(std::time::Duration::from_secs(60))
        .await
    {
        let responder = actor_from_component(&interaction);
        let token = interaction.data.custom_id.clone();

        match engine.resolve_clear(&responder, &token).await {
            Ok(resolution) => {
                if let Err(e) = interaction
                    .create_response(
                        ctx.http(),
                        serenity::CreateInteractionResponse::UpdateMessage(
                            serenity::CreateInteractionResponseMessage::new()
                                .content(messages::clear_resolved_text(&resolution))
                                .components(vec![]),
                        ),
                    )
                    .await
                {
                    error!("Failed to update clear prompt: {}", e);
                }
                return Ok(());
            }
            Err(e @ (OpError::IdentityMismatch | OpError::Unauthorized)) => {
                // Deny the responder but keep the prompt open for the
                // rightful actor.
                if let Err(send_err) = interaction
                    .create_response(
                        ctx.http(),
                        serenity::CreateInteractionResponse::Message(
                            serenity::CreateInteractionResponseMessage::new()
                                .content(messages::op_error_message(&e))
                                .ephemeral(true),
                        ),
                    )
                    .await
                {
                    error!("Failed to reply to rejected clear response: {}", send_err);
                }
            }
            Err(e) => {
                if let Err(send_err) = interaction
                    .create_response(
                        ctx.http(),
                        serenity::CreateInteractionResponse::UpdateMessage(
                            serenity::CreateInteractionResponseMessage::new()
                                .content(messages::op_error_message(&e))
                                .components(vec![]),
                        ),
                    )
                    .await
                {
                    error!("Failed to update clear prompt: {}", send_err);
                }
                return Ok(());
            }
        }
    }

    // Timed out. The stale prompt entry is swept on the next clearall.
    reply
        .edit(
            ctx,
            poise::CreateReply::default()
                .content("⌛ Confirmation timed out. Nothing was changed.")
                .components(vec![]),
        )
        .await?;
    Ok(())
}
