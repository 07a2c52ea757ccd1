use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::middleware::TraceId;
use crate::application::ports::{HeadType, PipelineRequest};
use crate::commands::{CommandKind, ParsedCommand, TRIGGER};
use crate::error::{BridgeError, Result};
use crate::infrastructure::logging::Timer;
use crate::models::{Subscription, VcsIdentity, VcsKind};
use crate::state::AppContext;

/// Form body of a Mattermost slash command request
#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub token: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    response_type: &'static str,
    text: String,
}

impl CommandResponse {
    fn ephemeral(text: String) -> Self {
        Self {
            response_type: "ephemeral",
            text,
        }
    }
}

pub async fn slash_command(
    State(ctx): State<AppContext>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    Form(command): Form<SlashCommand>,
) -> impl IntoResponse {
    let timer = Timer::start();
    // arguments may carry an API token, only the verb is logged
    let verb = command.text.split_whitespace().find(|w| *w != TRIGGER).unwrap_or("help");
    ctx.logger.api_entry(&trace_id, "POST", "/command", verb);

    if let Some(expected) = ctx.config.command_token.as_deref() {
        if command.token != expected {
            warn!("[{}] Slash command with invalid token from user {}", trace_id, command.user_id);
            ctx.logger.api_exit(&trace_id, "POST", "/command", timer.elapsed_ms(), 401);
            return (
                StatusCode::UNAUTHORIZED,
                Json(CommandResponse::ephemeral("Invalid command token.".to_string())),
            );
        }
    }

    let text = match ctx.commands.parse(&command.text) {
        ParsedCommand::Usage(usage) => usage,
        ParsedCommand::Run { kind, args } => match execute(&ctx, &trace_id, &command, kind, &args).await {
            Ok(reply) => reply,
            Err(e) if e.is_transient() => {
                warn!("[{}] Command `{}` failed: {}", trace_id, verb, e);
                e.user_message()
            }
            Err(e) => {
                info!("[{}] Command `{}` rejected: {}", trace_id, verb, e);
                e.user_message()
            }
        },
    };

    ctx.logger.api_exit(&trace_id, "POST", "/command", timer.elapsed_ms(), 200);
    (StatusCode::OK, Json(CommandResponse::ephemeral(text)))
}

async fn execute(
    ctx: &AppContext,
    trace_id: &str,
    command: &SlashCommand,
    kind: CommandKind,
    args: &[String],
) -> Result<String> {
    let user_id = command.user_id.as_str();
    let channel_id = command.channel_id.as_str();

    match kind {
        CommandKind::Connect => {
            let user = ctx.account_service.connect(trace_id, user_id, &args[0]).await?;
            Ok(format!("Successfully connected to CircleCI as **{}** (`{}`).", user.name, user.login))
        }
        CommandKind::Disconnect => {
            ctx.account_service.disconnect(trace_id, user_id).await?;
            Ok("Your CircleCI account has been disconnected.".to_string())
        }
        CommandKind::Me => {
            let user = ctx.account_service.me(trace_id, user_id).await?;
            Ok(format!("You are connected to CircleCI as **{}** (`{}`).", user.name, user.login))
        }
        CommandKind::Subscribe => {
            let subscription = subscription_from_args(ctx, trace_id, args, channel_id).await?;
            let name = subscription.full_name();
            if ctx.subscription_service.add(trace_id, subscription).await? {
                Ok(format!("This channel has been subscribed to notifications from **{}/{}**.", args[0], name))
            } else {
                Ok(format!("This channel is already subscribed to **{}/{}**.", args[0], name))
            }
        }
        CommandKind::Unsubscribe => {
            let subscription = subscription_from_args(ctx, trace_id, args, channel_id).await?;
            if ctx.subscription_service.remove(trace_id, &subscription).await? {
                Ok(format!(
                    "This channel has been unsubscribed from **{}/{}**.",
                    args[0],
                    subscription.full_name()
                ))
            } else {
                Ok(format!("This channel was not subscribed to **{}/{}**.", args[0], subscription.full_name()))
            }
        }
        CommandKind::ListSubscriptions => {
            let subscriptions = ctx.subscription_service.list(trace_id, channel_id).await?;
            if subscriptions.is_empty() {
                return Ok("This channel is not subscribed to any repository.".to_string());
            }
            let mut text = String::from("This channel is subscribed to:\n");
            for s in subscriptions {
                text.push_str(&format!("* **{}** ({} {})\n", s.full_name(), s.vcs_kind, s.base_url));
            }
            Ok(text)
        }
        CommandKind::AddVcs => {
            let kind: VcsKind = args[1].parse().map_err(BridgeError::Validation)?;
            ctx.vcs_service
                .add(trace_id, VcsIdentity::new(args[0].as_str(), kind, args[2].as_str()))
                .await?;
            Ok(format!("Successfully added VCS `{}`.", args[0]))
        }
        CommandKind::DeleteVcs => {
            ctx.vcs_service.delete(trace_id, &args[0]).await?;
            Ok(format!("Successfully deleted VCS `{}`.", args[0]))
        }
        CommandKind::ListVcs => {
            let mut text = String::from("Known VCS:\n");
            for vcs in ctx.vcs_service.list(trace_id).await? {
                text.push_str(&format!("* `{}` - {} {}\n", vcs.alias, vcs.kind, vcs.base_url));
            }
            Ok(text)
        }
        CommandKind::Build => {
            let vcs = ctx.vcs_service.resolve(trace_id, &args[0]).await?;
            let head_type: HeadType = args[3].parse().map_err(BridgeError::Validation)?;
            let request = PipelineRequest {
                vcs_kind: vcs.kind,
                org_name: args[1].clone(),
                repo_name: args[2].clone(),
                head_type,
                head: args[4].clone(),
            };
            let pipeline = ctx.account_service.trigger_pipeline(trace_id, user_id, &request).await?;
            Ok(format!(
                "Pipeline #{} created for **{}/{}** on {} `{}`.",
                pipeline.number, request.org_name, request.repo_name, args[3], request.head
            ))
        }
        CommandKind::Help => Ok(ctx.commands.help_text()),
    }
}

/// `<vcs> <org> <repo>` for the invoking channel
async fn subscription_from_args(
    ctx: &AppContext,
    trace_id: &str,
    args: &[String],
    channel_id: &str,
) -> Result<Subscription> {
    let vcs = ctx.vcs_service.resolve(trace_id, &args[0]).await?;
    Ok(Subscription::new(&vcs, &args[1], &args[2], channel_id))
}
