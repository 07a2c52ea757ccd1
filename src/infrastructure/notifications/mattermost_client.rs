use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::application::ports::PostSink;
use crate::models::Post;

/// Mattermost REST client posting as the bridge bot
#[derive(Clone)]
pub struct MattermostClient {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl MattermostClient {
    pub fn new(base_url: &str, bot_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn posts_url(&self) -> String {
        format!("{}/api/v4/posts", self.base_url)
    }
}

#[async_trait]
impl PostSink for MattermostClient {
    async fn create_post(&self, post: &Post) -> Result<()> {
        debug!("Creating Mattermost post in channel {}", post.channel_id);

        let response = self
            .client
            .post(self.posts_url())
            .bearer_auth(&self.bot_token)
            .json(post)
            .send()
            .await
            .context("Failed to reach Mattermost")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Mattermost post failed: {} - {}", status, body);
            anyhow::bail!("Mattermost returned {}: {}", status, body);
        }

        Ok(())
    }
}
