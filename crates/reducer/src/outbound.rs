//! Fire-and-forget requests the reducer hands to its collaborators.
//!
//! Nothing latency-bearing runs inside a handler; the reducer queues the
//! request and the host drains the queue after each `apply`. Results come
//! back later as their own events through the same serialized queue.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    /// Fresh diff statistics are needed for these paths of a checkpoint
    /// (newly added files, or re-edited files whose stats went stale).
    FetchDiffStats {
        checkpoint_id: String,
        paths: Vec<String>,
    },
    /// Full content of a file the backend pulled in as implicit context.
    FetchFileContent { path: String },
}
