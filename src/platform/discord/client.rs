//! Thin REST client for the endpoints the purge service needs.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::models::{
    Application, BulkDeleteRequest, Channel, EditMessageRequest, EditThreadRequest, ErrorBody,
    Guild, Member, Message, PartialGuild, RateLimitBody, User,
};
use crate::{
    config::DiscordConfig,
    platform::{
        ApplicationId, BotIdentity, ChannelId, DeleteOutcome, GuildId, MessageId, PlatformError,
        UserId,
    },
};

const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";
const GUILD_PAGE_SIZE: usize = 200;
const READY_RETRY_INITIAL: Duration = Duration::from_secs(1);
const READY_RETRY_MAX: Duration = Duration::from_secs(60);
/// Wait used when a 429 carries no `retry_after`.
const RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(1);
/// Longest single rate-limit wait honored before giving up.
const RATE_LIMIT_MAX_WAIT: Duration = Duration::from_secs(30);

/// Authenticated REST client. Cheap to clone.
#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    base_url: Arc<str>,
    token: Arc<str>,
    rate_limit_retries: u32,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!(
                "DiscordBot (https://github.com/purger/purger, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').into(),
            token: config.token.as_str().into(),
            rate_limit_retries: config.rate_limit_retries,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(http::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    fn with_reason(builder: RequestBuilder, reason: &str) -> RequestBuilder {
        builder.header(AUDIT_LOG_REASON, encode_reason(reason))
    }

    /// Send a request, turning every non-success status into an error.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, PlatformError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Send the request built by `make`, waiting out rate limits.
    ///
    /// A 429 is retried up to `rate_limit_retries` times after the wait the
    /// platform asks for. Every other error is returned at once.
    async fn send_retrying<F>(&self, operation: &str, make: F) -> Result<Response, PlatformError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.rate_limit_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(make()).await {
                Err(PlatformError::RateLimited { retry_after })
                    if attempt < max_attempts
                        && retry_after.is_none_or(|d| d <= RATE_LIMIT_MAX_WAIT) =>
                {
                    let delay = retry_after.unwrap_or(RATE_LIMIT_FALLBACK);
                    tracing::debug!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, will retry after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempt > 1 {
                        tracing::warn!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "Request failed after retries"
                        );
                    }
                    return Err(e);
                }
                Ok(response) => return Ok(response),
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let response = self
            .send_retrying(path, || self.request(Method::GET, path))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    pub async fn current_user(&self) -> Result<User, PlatformError> {
        self.get_json("/users/@me").await
    }

    pub async fn current_application(&self) -> Result<Application, PlatformError> {
        self.get_json("/oauth2/applications/@me").await
    }

    /// Identify the bot and its application.
    pub async fn identify(&self) -> Result<BotIdentity, PlatformError> {
        let user = self.current_user().await?;
        let application = self.current_application().await?;
        Ok(BotIdentity {
            user_id: user.id,
            application_id: application.id,
            username: user.username,
        })
    }

    /// Retry [`identify`](Self::identify) until it succeeds.
    ///
    /// Returns `None` if `cancel` fires first. Rejected credentials are not
    /// retried.
    pub async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<BotIdentity>, PlatformError> {
        let mut delay = READY_RETRY_INITIAL;
        loop {
            match self.identify().await {
                Ok(identity) => return Ok(Some(identity)),
                Err(e @ PlatformError::Status { status: 401, .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Platform not ready, retrying"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(READY_RETRY_MAX);
        }
    }

    /// Every guild the bot is in, following pagination.
    pub async fn list_guilds(&self) -> Result<Vec<PartialGuild>, PlatformError> {
        let mut guilds = Vec::new();
        let mut after: Option<GuildId> = None;
        loop {
            let mut path = format!("/users/@me/guilds?limit={GUILD_PAGE_SIZE}");
            if let Some(after) = after {
                path.push_str(&format!("&after={after}"));
            }
            let page: Vec<PartialGuild> = self.get_json(&path).await?;
            let page_len = page.len();
            after = page.last().map(|g| g.id);
            guilds.extend(page);
            if page_len < GUILD_PAGE_SIZE {
                return Ok(guilds);
            }
        }
    }

    pub async fn get_channel(&self, channel: ChannelId) -> Result<Channel, PlatformError> {
        self.get_json(&format!("/channels/{channel}")).await
    }

    pub async fn get_guild(&self, guild: GuildId) -> Result<Guild, PlatformError> {
        self.get_json(&format!("/guilds/{guild}")).await
    }

    pub async fn get_member(&self, guild: GuildId, user: UserId) -> Result<Member, PlatformError> {
        self.get_json(&format!("/guilds/{guild}/members/{user}"))
            .await
    }

    /// Up to `limit` messages, newest first, optionally older than `before`.
    pub async fn get_messages(
        &self,
        channel: ChannelId,
        before: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<Message>, PlatformError> {
        let mut path = format!("/channels/{channel}/messages?limit={limit}");
        if let Some(before) = before {
            path.push_str(&format!("&before={before}"));
        }
        self.get_json(&path).await
    }

    /// Delete 2 to 100 messages younger than the bulk window in one call.
    pub async fn bulk_delete(
        &self,
        channel: ChannelId,
        messages: &[MessageId],
        reason: &str,
    ) -> Result<(), PlatformError> {
        let body = BulkDeleteRequest {
            messages: messages.iter().map(ToString::to_string).collect(),
        };
        let path = format!("/channels/{channel}/messages/bulk-delete");
        self.send_retrying(&path, || {
            Self::with_reason(self.request(Method::POST, &path).json(&body), reason)
        })
        .await?;
        Ok(())
    }

    /// Delete one message. HTTP refusals become a [`DeleteOutcome`];
    /// only transport failures are errors.
    pub async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        reason: &str,
    ) -> Result<DeleteOutcome, PlatformError> {
        let builder = self.request(
            Method::DELETE,
            &format!("/channels/{channel}/messages/{message}"),
        );
        match self.send(Self::with_reason(builder, reason)).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(PlatformError::RateLimited { retry_after }) => {
                Ok(DeleteOutcome::RateLimited { retry_after })
            }
            Err(PlatformError::Forbidden(_)) => Ok(DeleteOutcome::Denied),
            Err(PlatformError::NotFound(_)) => Ok(DeleteOutcome::Missing),
            Err(PlatformError::Status { status, .. }) => Ok(DeleteOutcome::Failed { status }),
            Err(e) => Err(e),
        }
    }

    pub async fn set_thread_archived(
        &self,
        thread: ChannelId,
        archived: bool,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let path = format!("/channels/{thread}");
        let body = EditThreadRequest { archived };
        self.send_retrying(&path, || {
            Self::with_reason(self.request(Method::PATCH, &path).json(&body), reason)
        })
        .await?;
        Ok(())
    }

    pub async fn join_thread(&self, thread: ChannelId) -> Result<(), PlatformError> {
        let path = format!("/channels/{thread}/thread-members/@me");
        self.send_retrying(&path, || self.request(Method::PUT, &path))
            .await?;
        Ok(())
    }

    /// Replace the registered slash commands, globally or for one guild.
    pub async fn overwrite_commands(
        &self,
        application: ApplicationId,
        guild: Option<GuildId>,
        commands: &serde_json::Value,
    ) -> Result<usize, PlatformError> {
        let path = match guild {
            Some(guild) => format!("/applications/{application}/guilds/{guild}/commands"),
            None => format!("/applications/{application}/commands"),
        };
        let response = self
            .send(self.request(Method::PUT, &path).json(commands))
            .await?;
        let registered: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        Ok(registered.len())
    }

    /// Replace the content of a deferred interaction response.
    pub async fn edit_original_response(
        &self,
        application: ApplicationId,
        interaction_token: &str,
        content: &str,
    ) -> Result<(), PlatformError> {
        // Webhook endpoints authenticate through the interaction token.
        let builder = self
            .http
            .request(
                Method::PATCH,
                format!(
                    "{}/webhooks/{application}/{interaction_token}/messages/@original",
                    self.base_url
                ),
            )
            .json(&EditMessageRequest { content });
        self.send(builder).await?;
        Ok(())
    }
}

/// Audit log reasons travel in a header and must be percent-encoded.
fn encode_reason(reason: &str) -> String {
    url::form_urlencoded::byte_serialize(reason.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

async fn error_from_response(response: Response) -> PlatformError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = serde_json::from_str::<RateLimitBody>(&body)
                .ok()
                .and_then(|b| b.retry_after)
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64);
            PlatformError::RateLimited { retry_after }
        }
        StatusCode::FORBIDDEN => PlatformError::Forbidden(error_message(&body)),
        StatusCode::NOT_FOUND => PlatformError::NotFound(error_message(&body)),
        other => PlatformError::Status {
            status: other.as_u16(),
            message: error_message(&body),
        },
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}
