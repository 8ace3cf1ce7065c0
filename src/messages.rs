// src/messages.rs

use poise::serenity_prelude as serenity;

use crate::engine::{
    AllowOutcome, ClearResolution, ConnectOutcome, OpError, RemoveOutcome, SubmitOutcome,
};
use crate::notify::Notification;
use crate::state::PlayerRecord;

pub fn op_error_message(err: &OpError) -> String {
    match err {
        OpError::Unauthorized => {
            "🚫 **Not allowed**\n\nThis command is reserved for event staff.".to_string()
        }
        OpError::NotConnected => "❓ **Not connected**\n\n\
            I don't know your name yet. Run `/connect <name>` with your community name first."
            .to_string(),
        OpError::NotRegistered => "⏳ **Not registered**\n\n\
            You are not admitted to the event yet. A staff member has to `/allow` you before you can submit."
            .to_string(),
        OpError::NotSubmitted => {
            "📭 **No submission**\n\nThat player has no decklist on file.".to_string()
        }
        OpError::NoChannelConfigured => "🔇 **Submissions are closed**\n\n\
            No submissions channel is configured. Ask a staff member to run `/setchannel`."
            .to_string(),
        OpError::InvalidChannel => "⚠️ **Broken submissions channel**\n\n\
            The configured submissions channel no longer exists. Ask a staff member to run `/setchannel` again."
            .to_string(),
        OpError::WrongChannelType => {
            "⚠️ **Wrong channel type**\n\nSubmissions can only go to a text channel.".to_string()
        }
        OpError::IdentityMismatch => {
            "🚫 **Not your prompt**\n\nOnly the staff member who started this action can resolve it."
                .to_string()
        }
        OpError::PromptExpired => {
            "⌛ **Prompt expired**\n\nThis confirmation was already resolved or has expired."
                .to_string()
        }
        OpError::StoreUnavailable => "⚠️ **Saved in memory only**\n\n\
            The change was applied but could not be written to disk. It will be retried on the next change."
            .to_string(),
    }
}

pub fn empty_name_reply() -> String {
    "❓ **That name is empty**\n\n\
    Give me the name you actually use in the community: `/connect <name>`."
        .to_string()
}

pub fn connect_reply(outcome: &ConnectOutcome) -> String {
    let mut reply = format!(
        "✅ **Connected!**\n\nYou are registered in my book as **{}**.",
        outcome.display_name
    );
    if outcome.registered {
        reply.push_str("\n\nYou are admitted to the event and can `/submit` your decklist.");
    } else if outcome.announced {
        reply.push_str("\n\n⏳ Staff have been notified of your registration request.");
    } else {
        reply.push_str("\n\n⏳ A staff member still has to admit you with `/allow`.");
    }
    reply
}

pub fn submit_reply(outcome: &SubmitOutcome) -> String {
    let framing = if outcome.looks_like_archive {
        "Your archive decklist"
    } else {
        "Your link"
    };
    format!(
        "📬 **Submission received, {}!**\n\n\
        {} is on file and has been announced to the staff channel:\n{}\n\n\
        Submitting again will overwrite it and reset its review status.",
        outcome.display_name, framing, outcome.link
    )
}

pub fn allow_reply(target: &str, outcome: &AllowOutcome) -> String {
    if outcome.already_registered {
        format!("ℹ️ <@{}> was already admitted to the event.", target)
    } else {
        format!("✅ <@{}> is now admitted to the event.", target)
    }
}

pub fn remove_reply(target: &str, outcome: &RemoveOutcome) -> String {
    match outcome {
        RemoveOutcome::Removed { had_submission: true } => format!(
            "✅ <@{}> was removed from the event and their submission was discarded.",
            target
        ),
        RemoveOutcome::Removed { had_submission: false } => {
            format!("✅ <@{}> was removed from the event.", target)
        }
        RemoveOutcome::NothingToRemove => {
            format!("ℹ️ <@{}> had nothing on file. Nothing to remove.", target)
        }
    }
}

pub fn review_reply(target: &str, reviewed: bool) -> String {
    if reviewed {
        format!("✅ Submission of <@{}> marked as reviewed.", target)
    } else {
        format!("↩️ Submission of <@{}> marked as not reviewed.", target)
    }
}

pub fn clear_prompt_text(player_count: usize) -> String {
    format!(
        "⚠️ **Clear all player data?**\n\n\
        This will drop **{}** player record(s), including every registration and submission. \
        There is no undo.\n\nOnly you can resolve this prompt.",
        player_count
    )
}

pub fn clear_resolved_text(resolution: &ClearResolution) -> String {
    match resolution {
        ClearResolution::Cleared { players_dropped } => format!(
            "🗑️ **Cleared.** Dropped {} player record(s). The event starts fresh.",
            players_dropped
        ),
        ClearResolution::Cancelled => "👍 Cancelled. Nothing was changed.".to_string(),
    }
}

pub fn status_embed(identity: &str, record: &PlayerRecord) -> serenity::CreateEmbed {
    let check = |b: bool| if b { "✅" } else { "❌" };
    serenity::CreateEmbed::new()
        .title("Your event status")
        .field(
            "Name",
            record.display_name.clone().unwrap_or_else(|| "*not connected*".to_string()),
            true,
        )
        .field("Registered", check(record.registered), true)
        .field("Submitted", check(record.deck_submitted), true)
        .field("Reviewed", check(record.deck_reviewed), true)
        .field(
            "Decklist",
            record.deck_link.clone().unwrap_or_else(|| "*none*".to_string()),
            false,
        )
        .footer(serenity::CreateEmbedFooter::new(format!("ID: {}", identity)))
        .color(0x3498db)
}

pub fn player_list_embed(players: &[(String, PlayerRecord)]) -> serenity::CreateEmbed {
    let mut lines = Vec::new();
    for (identity, record) in players {
        let name = record.display_name.as_deref().unwrap_or("(no name)");
        let registered = if record.registered { "✅" } else { "—" };
        let deck = match (&record.deck_link, record.deck_reviewed) {
            (Some(link), true) => format!("[deck]({}) ✔ reviewed", link),
            (Some(link), false) => format!("[deck]({}) ⏳ unreviewed", link),
            (None, _) => "no deck".to_string(),
        };
        lines.push(format!("{} **{}** (<@{}>) — {}", registered, name, identity, deck));
    }

    let description = if lines.is_empty() {
        "No players on file.".to_string()
    } else {
        lines.join("\n")
    };

    serenity::CreateEmbed::new()
        .title(format!("Players ({})", players.len()))
        .description(description)
        .color(0x3498db)
}

pub fn notification_embed(notification: &Notification) -> serenity::CreateEmbed {
    match notification {
        Notification::Submission {
            actor_identity,
            display_name,
            link,
            looks_like_archive,
        } => {
            let framing = if *looks_like_archive {
                "submitted an archive decklist"
            } else {
                "submitted a decklist link"
            };
            serenity::CreateEmbed::new()
                .title("📬 New submission")
                .description(format!(
                    "**{}** (<@{}>) {}:\n{}",
                    display_name, actor_identity, framing, link
                ))
                .color(0x2ecc71)
        }
        Notification::RegistrationRequest {
            actor_identity,
            display_name,
        } => serenity::CreateEmbed::new()
            .title("⏳ Registration request")
            .description(format!(
                "**{}** (<@{}>) connected and is waiting for approval. Use `/allow` to admit them.",
                display_name, actor_identity
            ))
            .color(0xf1c40f),
    }
}

pub fn approved_dm() -> String {
    "✅ **You are in!**\n\n\
    A staff member admitted you to the event. You can now submit your decklist with `/submit`."
        .to_string()
}

pub fn removed_dm() -> String {
    "ℹ️ **Event status changed**\n\n\
    A staff member removed you from the event. Any submitted decklist was discarded.\n\
    If you believe this is an error, please contact the staff."
        .to_string()
}
