use std::sync::Arc;

use crate::application::ports::{CiClient, CiUser, InvalidToken, KvStore, PipelineRequest, TriggeredPipeline};
use crate::application::services::kv_mutator::KvMutator;
use crate::error::{BridgeError, Result};
use crate::infrastructure::logging::{BoundaryLogger, Timer};

fn token_key(user_id: &str) -> String {
    format!("{}_auth_token", user_id)
}

/// A 401 is reported back to the user, anything else counts as an upstream failure
fn ci_error(e: &anyhow::Error) -> BridgeError {
    if e.downcast_ref::<InvalidToken>().is_some() {
        BridgeError::Validation(
            "CircleCI rejected the API token. Create a personal token and run `/circleci connect <token>`.".to_string(),
        )
    } else {
        BridgeError::Upstream(format!("{:#}", e))
    }
}

/// AccountService - links chat users to their CircleCI API tokens
pub struct AccountService<S, C>
where
    S: KvStore + ?Sized,
    C: CiClient + ?Sized,
{
    kv: Arc<KvMutator<S>>,
    ci: Arc<C>,
    logger: Arc<BoundaryLogger>,
}

impl<S, C> AccountService<S, C>
where
    S: KvStore + ?Sized,
    C: CiClient + ?Sized,
{
    pub fn new(kv: Arc<KvMutator<S>>, ci: Arc<C>, logger: Arc<BoundaryLogger>) -> Self {
        Self { kv, ci, logger }
    }

    /// Verify `token` against CircleCI, then store it for `user_id`
    pub async fn connect(&self, trace_id: &str, user_id: &str, token: &str) -> Result<CiUser> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "AccountService", "connect", &user_id);

        if token.trim().is_empty() {
            let e = BridgeError::Validation("Please specify an API token.".to_string());
            self.logger.service_error(trace_id, "Command", "AccountService", "connect", &e);
            return Err(e);
        }

        let user = self.me_with(trace_id, token).await?;
        self.kv
            .set(trace_id, "AccountService", &token_key(user_id), token.trim().as_bytes())
            .await?;

        self.logger.service_exit(trace_id, "Command", "AccountService", "connect", timer.elapsed_ms());
        Ok(user)
    }

    pub async fn disconnect(&self, trace_id: &str, user_id: &str) -> Result<()> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "AccountService", "disconnect", &user_id);

        self.token(trace_id, user_id).await?;
        self.kv.delete(trace_id, "AccountService", &token_key(user_id)).await?;

        self.logger.service_exit(trace_id, "Command", "AccountService", "disconnect", timer.elapsed_ms());
        Ok(())
    }

    pub async fn token(&self, trace_id: &str, user_id: &str) -> Result<String> {
        let bytes = self.kv.get(trace_id, "AccountService", &token_key(user_id)).await?;
        match bytes {
            Some(bytes) if !bytes.is_empty() => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            _ => Err(BridgeError::NotConnected),
        }
    }

    /// CircleCI user behind the stored token
    pub async fn me(&self, trace_id: &str, user_id: &str) -> Result<CiUser> {
        let token = self.token(trace_id, user_id).await?;
        self.me_with(trace_id, &token).await
    }

    pub async fn trigger_pipeline(
        &self,
        trace_id: &str,
        user_id: &str,
        request: &PipelineRequest,
    ) -> Result<TriggeredPipeline> {
        let token = self.token(trace_id, user_id).await?;

        self.logger.external_call(trace_id, "AccountService", "CircleCI", "trigger_pipeline");
        let timer = Timer::start();
        let pipeline = self.ci.trigger_pipeline(&token, request).await.map_err(|e| {
            self.logger.external_error(trace_id, "AccountService", "CircleCI", "trigger_pipeline", &e);
            ci_error(&e)
        })?;
        self.logger.external_done(trace_id, "AccountService", "CircleCI", "trigger_pipeline", timer.elapsed_ms());

        Ok(pipeline)
    }

    async fn me_with(&self, trace_id: &str, token: &str) -> Result<CiUser> {
        self.logger.external_call(trace_id, "AccountService", "CircleCI", "me");
        let timer = Timer::start();
        let user = self.ci.me(token.trim()).await.map_err(|e| {
            self.logger.external_error(trace_id, "AccountService", "CircleCI", "me", &e);
            ci_error(&e)
        })?;
        self.logger.external_done(trace_id, "AccountService", "CircleCI", "me", timer.elapsed_ms());
        Ok(user)
    }
}
