use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(poise::CreateReply::default()
        .content("Pong! Bot is working!")
        .ephemeral(true))
        .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("/ping", "Check if the bot is running", false)
        .field("/connect", "Tell me your community name", false)
        .field("/submit", "Submit your decklist link", false)
        .field("/status", "Show your own registration and submission status", false)
        .field("/setchannel", "Set the submissions announcement channel (Staff)", false)
        .field("/allow", "Admit a player to the event (Staff)", false)
        .field("/remove", "Remove a player from the event (Staff)", false)
        .field("/review", "Mark a player's submission as reviewed (Staff)", false)
        .field("/players", "List all players and their status (Staff)", false)
        .field("/clearall", "Clear all player data for a fresh event (Staff)", false)
        .color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
