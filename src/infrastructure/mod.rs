pub mod circleci;
pub mod database;
pub mod logging;
pub mod notifications;
