//! Live event reducer: turns the serialized inbound event stream into the
//! in-memory timeline, one event at a time.

mod approvals;
mod context;
mod files;
mod outbound;
mod progress;
mod reducer;

pub use context::{GroupAddr, ReducerContext};
pub use outbound::OutboundRequest;
pub use reducer::TimelineReducer;
