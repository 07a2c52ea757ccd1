pub mod account_service;
pub mod kv_mutator;
pub mod notification_service;
pub mod subscription_service;
pub mod vcs_service;

pub use account_service::AccountService;
pub use kv_mutator::{KvMutator, DEFAULT_MAX_ATTEMPTS};
pub use notification_service::{BotIcons, NotificationService};
pub use subscription_service::SubscriptionService;
pub use vcs_service::VcsService;
