pub mod mattermost_client;

pub use mattermost_client::MattermostClient;
