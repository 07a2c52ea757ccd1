use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::{KvStore, PostSink};
use crate::application::services::subscription_service::SubscriptionService;
use crate::error::Result;
use crate::infrastructure::logging::{BoundaryLogger, Timer};
use crate::models::post::{COLOR_FAILURE, COLOR_SUCCESS};
use crate::models::{Attachment, AttachmentField, BuildEvent, BuildStatus, Post, PostProps};

const WORKFLOW_URL: &str = "https://circleci.com/workflow-run";

/// Bot icons per build result; `None` keeps the bot's own avatar
#[derive(Debug, Clone, Default)]
pub struct BotIcons {
    pub success: Option<String>,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub subscribed: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// NotificationService - fans a build result out to subscribed channels
pub struct NotificationService<S, P>
where
    S: KvStore + ?Sized,
    P: PostSink + ?Sized,
{
    subscriptions: Arc<SubscriptionService<S>>,
    sink: Arc<P>,
    icons: BotIcons,
    logger: Arc<BoundaryLogger>,
}

impl<S, P> NotificationService<S, P>
where
    S: KvStore + ?Sized,
    P: PostSink + ?Sized,
{
    pub fn new(
        subscriptions: Arc<SubscriptionService<S>>,
        sink: Arc<P>,
        icons: BotIcons,
        logger: Arc<BoundaryLogger>,
    ) -> Self {
        Self {
            subscriptions,
            sink,
            icons,
            logger,
        }
    }

    /// Delivery is best effort: a failed post is logged and the remaining
    /// channels are still served. Only registry failures are returned.
    pub async fn dispatch(&self, trace_id: &str, event: &BuildEvent) -> Result<DispatchOutcome> {
        let timer = Timer::start();
        let lookup = event.subscription();
        self.logger.service_entry(trace_id, "Webhook", "Dispatcher", "dispatch", &lookup.full_name());

        let channels = match self.subscriptions.channels_for(trace_id, &lookup).await {
            Ok(channels) => channels,
            Err(e) => {
                self.logger.service_error(trace_id, "Webhook", "Dispatcher", "dispatch", &e);
                return Err(e);
            }
        };

        let mut outcome = DispatchOutcome {
            subscribed: channels.len(),
            ..Default::default()
        };

        if channels.is_empty() {
            info!("[{}] No channels subscribed to {}", trace_id, lookup.full_name());
            self.logger.service_exit(trace_id, "Webhook", "Dispatcher", "dispatch", timer.elapsed_ms());
            return Ok(outcome);
        }

        let post = render_post(event, &self.icons);
        for channel_id in &channels {
            self.logger.external_call(trace_id, "Dispatcher", "Mattermost", "create_post");
            let post_timer = Timer::start();
            match self.sink.create_post(&post.for_channel(channel_id)).await {
                Ok(()) => {
                    self.logger.external_done(trace_id, "Dispatcher", "Mattermost", "create_post", post_timer.elapsed_ms());
                    outcome.delivered += 1;
                }
                Err(e) => {
                    self.logger.external_error(trace_id, "Dispatcher", "Mattermost", "create_post", &e);
                    warn!("[{}] Failed to post build result to channel {}: {:#}", trace_id, channel_id, e);
                    outcome.failed += 1;
                }
            }
        }

        info!(
            "[{}] Build {} of {} sent to {}/{} channels",
            trace_id,
            event.build_num,
            lookup.full_name(),
            outcome.delivered,
            outcome.subscribed
        );
        self.logger.service_exit(trace_id, "Webhook", "Dispatcher", "dispatch", timer.elapsed_ms());
        Ok(outcome)
    }
}

/// One post per event, reused for every subscribed channel
pub fn render_post(event: &BuildEvent, icons: &BotIcons) -> Post {
    let job = if event.job_name.is_empty() { "build" } else { event.job_name.as_str() };
    let (color, title, icon) = match event.status {
        BuildStatus::Success => (
            COLOR_SUCCESS,
            format!(":tada: A **{}** job has succeeded!", job),
            icons.success.clone(),
        ),
        BuildStatus::Failure => (
            COLOR_FAILURE,
            format!(":red_circle: A **{}** job has failed!", job),
            icons.failure.clone(),
        ),
    };

    let workflow_label = if event.pipeline_number.is_empty() {
        "Visit Workflow"
    } else {
        event.pipeline_number.as_str()
    };

    let mut fields = vec![
        AttachmentField::new("Project", format!("{}/{}", event.org_name, event.repo_name), false),
        AttachmentField::new("Job Number", format!("[{}]({})", event.build_num, event.build_url), true),
        AttachmentField::new("Commit", event.short_commit(), true),
        AttachmentField::new("Triggered By", format!("@{}", event.username), true),
        AttachmentField::new(
            "Workflow",
            format!("[{}]({}/{})", workflow_label, WORKFLOW_URL, event.workflow_id),
            true,
        ),
    ];
    if !event.branch.is_empty() {
        fields.push(AttachmentField::new("Branch", event.branch.as_str(), true));
    }
    if !event.tag.is_empty() {
        fields.push(AttachmentField::new("Tag", event.tag.as_str(), true));
    }

    Post {
        channel_id: String::new(),
        message: String::new(),
        props: PostProps {
            attachments: vec![Attachment {
                fallback: format!("CircleCI job {} of {}/{}: {}", event.build_num, event.org_name, event.repo_name, event.status),
                color: color.to_string(),
                title,
                fields,
                thumb_url: icon.clone(),
            }],
            // Mattermost only honours the icon override on webhook-style posts
            from_webhook: icon.as_ref().map(|_| "true".to_string()),
            override_icon_url: icon,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::services::kv_mutator::{KvMutator, DEFAULT_MAX_ATTEMPTS};
    use crate::infrastructure::database::MemoryKvStore;
    use crate::models::{builtin_vcs, Subscription};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every post; channels listed in `failing` error out
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub posts: Mutex<Vec<Post>>,
        pub failing: Vec<String>,
    }

    #[async_trait]
    impl PostSink for RecordingSink {
        async fn create_post(&self, post: &Post) -> anyhow::Result<()> {
            if self.failing.contains(&post.channel_id) {
                anyhow::bail!("channel {} is archived", post.channel_id);
            }
            self.posts.lock().unwrap().push(post.clone());
            Ok(())
        }
    }

    fn event() -> BuildEvent {
        serde_json::from_value(serde_json::json!({
            "status": "success",
            "build_num": "42",
            "org_name": "acme",
            "repo_name": "widgets",
            "commit": "0123456789abcdef",
            "build_url": "https://circleci.com/gh/acme/widgets/42",
            "repo_url": "git@github.com:acme/widgets.git",
            "branch": "main",
            "username": "alice",
            "job_name": "test",
            "workflow_id": "wf-1",
        }))
        .unwrap()
    }

    async fn dispatcher(
        channels: &[&str],
        sink: Arc<RecordingSink>,
    ) -> NotificationService<MemoryKvStore, RecordingSink> {
        let logger = Arc::new(BoundaryLogger::new());
        let kv = Arc::new(KvMutator::new(Arc::new(MemoryKvStore::new()), DEFAULT_MAX_ATTEMPTS, logger.clone()));
        let subscriptions = Arc::new(SubscriptionService::new(kv, logger.clone()));
        let github = builtin_vcs("github").unwrap();
        for channel in channels {
            subscriptions
                .add("t", Subscription::new(&github, "acme", "widgets", channel))
                .await
                .unwrap();
        }
        NotificationService::new(subscriptions, sink, BotIcons::default(), logger)
    }

    #[tokio::test]
    async fn test_single_subscriber_gets_one_post() {
        let sink = Arc::new(RecordingSink::default());
        let svc = dispatcher(&["C1"], sink.clone()).await;

        let outcome = svc.dispatch("t", &event()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome { subscribed: 1, delivered: 1, failed: 0 });

        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel_id, "C1");

        let rendered = serde_json::to_string(&posts[0]).unwrap();
        assert!(rendered.contains("[42](https://circleci.com/gh/acme/widgets/42)"));
        assert!(rendered.contains("acme/widgets"));
        assert!(rendered.contains("0123456"));
    }

    #[tokio::test]
    async fn test_fan_out_posts_identical_content() {
        let sink = Arc::new(RecordingSink::default());
        let svc = dispatcher(&["C1", "C2", "C3"], sink.clone()).await;

        let outcome = svc.dispatch("t", &event()).await.unwrap();
        assert_eq!(outcome.delivered, 3);

        let posts = sink.posts.lock().unwrap();
        let mut channels: Vec<&str> = posts.iter().map(|p| p.channel_id.as_str()).collect();
        channels.sort();
        assert_eq!(channels, vec!["C1", "C2", "C3"]);
        assert!(posts.iter().all(|p| p.props == posts[0].props));
    }

    #[tokio::test]
    async fn test_no_subscribers_posts_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let svc = dispatcher(&[], sink.clone()).await;

        let outcome = svc.dispatch("t", &event()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::default());
        assert!(sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_channel_does_not_stop_the_rest() {
        let sink = Arc::new(RecordingSink {
            failing: vec!["C2".to_string()],
            ..Default::default()
        });
        let svc = dispatcher(&["C1", "C2", "C3"], sink.clone()).await;

        let outcome = svc.dispatch("t", &event()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome { subscribed: 3, delivered: 2, failed: 1 });
        assert_eq!(sink.posts.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_render_success_post() {
        let post = render_post(&event(), &BotIcons::default());
        let attachment = &post.props.attachments[0];

        assert_eq!(attachment.color, COLOR_SUCCESS);
        assert_eq!(attachment.title, ":tada: A **test** job has succeeded!");
        let field = |name: &str| attachment.fields.iter().find(|f| f.title == name).map(|f| f.value.clone());
        assert_eq!(field("Project").as_deref(), Some("acme/widgets"));
        let project = attachment.fields.iter().find(|f| f.title == "Project").unwrap();
        assert!(!project.short);
        assert!(attachment.fields.iter().filter(|f| f.title != "Project").all(|f| f.short));
        assert_eq!(field("Triggered By").as_deref(), Some("@alice"));
        assert_eq!(
            field("Workflow").as_deref(),
            Some("[Visit Workflow](https://circleci.com/workflow-run/wf-1)")
        );
        assert_eq!(field("Branch").as_deref(), Some("main"));
        assert!(field("Tag").is_none());
        assert!(post.props.override_icon_url.is_none());
        assert!(attachment.thumb_url.is_none());
    }

    #[test]
    fn test_render_failure_post_with_icon() {
        let mut e = event();
        e.status = BuildStatus::Failure;
        e.pipeline_number = "7".to_string();
        e.tag = "v1.0.0".to_string();
        let icons = BotIcons {
            success: None,
            failure: Some("https://cdn.acme.io/red.png".to_string()),
        };

        let post = render_post(&e, &icons);
        let attachment = &post.props.attachments[0];
        assert_eq!(attachment.color, COLOR_FAILURE);
        assert_eq!(attachment.title, ":red_circle: A **test** job has failed!");
        assert!(attachment.fields.iter().any(|f| f.title == "Tag" && f.value == "v1.0.0"));
        assert!(attachment
            .fields
            .iter()
            .any(|f| f.value == "[7](https://circleci.com/workflow-run/wf-1)"));
        assert_eq!(post.props.override_icon_url.as_deref(), Some("https://cdn.acme.io/red.png"));
        assert_eq!(attachment.thumb_url.as_deref(), Some("https://cdn.acme.io/red.png"));
    }
}
