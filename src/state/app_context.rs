use std::sync::Arc;

use crate::application::ports::{CiClient, KvStore, PostSink};
use crate::application::services::{
    AccountService, KvMutator, NotificationService, SubscriptionService, VcsService,
};
use crate::commands::CommandTable;
use crate::config::AppConfig;
use crate::infrastructure::logging::BoundaryLogger;

/// AppContext - DI container handed to every handler
///
/// Host capabilities (KV store, chat sink, CI client) come in as trait
/// objects so tests can swap them for in-memory fakes.
#[derive(Clone)]
pub struct AppContext {
    // Services (Application Layer)
    pub subscription_service: Arc<SubscriptionService<dyn KvStore>>,
    pub vcs_service: Arc<VcsService<dyn KvStore>>,
    pub account_service: Arc<AccountService<dyn KvStore, dyn CiClient>>,
    pub notification_service: Arc<NotificationService<dyn KvStore, dyn PostSink>>,

    // Immutable tables
    pub commands: Arc<CommandTable>,

    // Infrastructure
    pub logger: Arc<BoundaryLogger>,

    // Config
    pub config: Arc<AppConfig>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KvStore>,
        sink: Arc<dyn PostSink>,
        ci: Arc<dyn CiClient>,
    ) -> Self {
        let logger = Arc::new(BoundaryLogger::new());
        let kv = Arc::new(KvMutator::new(store, config.cas_max_attempts, logger.clone()));

        let subscription_service = Arc::new(SubscriptionService::new(kv.clone(), logger.clone()));
        let vcs_service = Arc::new(VcsService::new(kv.clone(), logger.clone()));
        let account_service = Arc::new(AccountService::new(kv, ci, logger.clone()));
        let notification_service = Arc::new(NotificationService::new(
            subscription_service.clone(),
            sink,
            config.icons.clone(),
            logger.clone(),
        ));

        Self {
            subscription_service,
            vcs_service,
            account_service,
            notification_service,
            commands: Arc::new(CommandTable::new()),
            logger,
            config: Arc::new(config),
        }
    }
}
