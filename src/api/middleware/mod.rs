pub mod trace_id;

pub use trace_id::{add_trace_id, TraceId};
