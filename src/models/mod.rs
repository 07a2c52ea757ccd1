pub mod post;
pub mod registry;
pub mod subscription;
pub mod vcs;
pub mod webhook;

pub use post::{Attachment, AttachmentField, Post, PostProps};
pub use registry::Subscriptions;
pub use subscription::Subscription;
pub use vcs::{builtin_vcs, builtin_vcs_list, VcsIdentity, VcsKind};
pub use webhook::{BuildEvent, BuildStatus};
