pub mod outbound;
pub mod repositories;

pub use outbound::{CiClient, CiUser, HeadType, InvalidToken, PipelineRequest, PostSink, TriggeredPipeline};
pub use repositories::KvStore;
