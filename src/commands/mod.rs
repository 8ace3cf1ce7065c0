pub mod general;
pub mod player;
pub mod staff;

pub use general::{help, ping};
pub use player::{connect, status, submit};
pub use staff::{allow, clearall, players, remove, review, setchannel};

use poise::serenity_prelude as serenity;

use crate::auth::Actor;
use crate::Context;

/// Build the engine-facing actor from the invoking command context.
pub(crate) async fn actor_from_ctx(ctx: &Context<'_>) -> Actor {
    let mut actor = Actor::new(ctx.author().id.to_string());
    if let Some(member) = ctx.author_member().await {
        actor.roles = member.roles.iter().map(|r| r.to_string()).collect();
        actor.has_elevated_permission = member
            .permissions
            .map(|p| p.administrator() || p.manage_guild())
            .unwrap_or(false);
    }
    actor
}

/// Build the actor for whoever clicked a component. Identity and privilege
/// are taken from the interaction itself, not from the original command.
pub(crate) fn actor_from_component(interaction: &serenity::ComponentInteraction) -> Actor {
    let mut actor = Actor::new(interaction.user.id.to_string());
    if let Some(member) = &interaction.member {
        actor.roles = member.roles.iter().map(|r| r.to_string()).collect();
        actor.has_elevated_permission = member
            .permissions
            .map(|p| p.administrator() || p.manage_guild())
            .unwrap_or(false);
    }
    actor
}
