//! Wire contract shared by the live path and the replay path.
//!
//! Every inbound message is one JSON object with a `type` discriminant:
//! `{ "type": "streamThinking", "sessionId": "...", "content": "..." }`.
//! Unknown `type` values deserialize to [`UiEventKind::Unknown`] and are
//! ignored by both consumers.

use crate::timeline::{ActionStatus, FileChangeAction};
use serde::{Deserialize, Serialize};

/// One inbound event: session scope plus the typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiEvent {
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub kind: UiEventKind,
}

impl UiEvent {
    pub fn new(kind: UiEventKind) -> Self {
        Self {
            session_id: None,
            kind,
        }
    }

    pub fn for_session(session_id: impl Into<String>, kind: UiEventKind) -> Self {
        Self {
            session_id: Some(session_id.into()),
            kind,
        }
    }

    /// Whether this event applies to the given active session.
    ///
    /// Chrome events always apply. Session-scoped events apply when they
    /// carry no session id or the ids match; anything else is a no-op for
    /// the consumer (multiplexed concurrent sessions).
    pub fn targets(&self, active: Option<&str>) -> bool {
        if self.kind.is_chrome() {
            return true;
        }
        match (self.session_id.as_deref(), active) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(event_session), Some(active_session)) => event_session == active_session,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiEventKind {
    // Thinking stream
    StreamThinking {
        content: String,
    },
    CollapseThinking {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    // Thread-level answer text
    StreamChunk {
        content: String,
    },
    FinalMessage {
        content: String,
    },

    // Progress-group lifecycle
    StartProgressGroup {
        title: String,
        #[serde(default)]
        is_subagent: bool,
    },
    ShowToolAction {
        status: ActionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checkpoint_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_line: Option<u32>,
    },
    FinishProgressGroup,
    SubagentThinking {
        content: String,
    },

    // Approvals
    RequestToolApproval {
        approval_id: String,
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    ToolApprovalResult {
        approval_id: String,
        approved: bool,
    },
    RequestFileEditApproval {
        approval_id: String,
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diff: Option<String>,
    },
    FileEditApprovalResult {
        approval_id: String,
        approved: bool,
    },

    // File changes
    FilesChanged {
        checkpoint_id: String,
        files: Vec<FileChangePayload>,
    },
    FilesDiffStats {
        checkpoint_id: String,
        stats: Vec<FileDiffStat>,
    },
    FileChangeResult {
        path: String,
        kept: bool,
    },
    KeepUndoResult {
        checkpoint_id: String,
        kept: bool,
    },

    // Errors and banners
    ShowError {
        message: String,
    },
    ShowWarningBanner {
        message: String,
    },

    // Pure UI chrome, never session-scoped
    ShowThinking {
        active: bool,
    },
    TokenUsage {
        input_tokens: u64,
        output_tokens: u64,
    },

    #[serde(other)]
    Unknown,
}

impl UiEventKind {
    /// Chrome events affect transient UI state only, never the timeline
    /// structure, and ignore session scoping.
    pub fn is_chrome(&self) -> bool {
        matches!(
            self,
            UiEventKind::ShowThinking { .. } | UiEventKind::TokenUsage { .. }
        )
    }

    /// Wire name of the discriminant, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            UiEventKind::StreamThinking { .. } => "streamThinking",
            UiEventKind::CollapseThinking { .. } => "collapseThinking",
            UiEventKind::StreamChunk { .. } => "streamChunk",
            UiEventKind::FinalMessage { .. } => "finalMessage",
            UiEventKind::StartProgressGroup { .. } => "startProgressGroup",
            UiEventKind::ShowToolAction { .. } => "showToolAction",
            UiEventKind::FinishProgressGroup => "finishProgressGroup",
            UiEventKind::SubagentThinking { .. } => "subagentThinking",
            UiEventKind::RequestToolApproval { .. } => "requestToolApproval",
            UiEventKind::ToolApprovalResult { .. } => "toolApprovalResult",
            UiEventKind::RequestFileEditApproval { .. } => "requestFileEditApproval",
            UiEventKind::FileEditApprovalResult { .. } => "fileEditApprovalResult",
            UiEventKind::FilesChanged { .. } => "filesChanged",
            UiEventKind::FilesDiffStats { .. } => "filesDiffStats",
            UiEventKind::FileChangeResult { .. } => "fileChangeResult",
            UiEventKind::KeepUndoResult { .. } => "keepUndoResult",
            UiEventKind::ShowError { .. } => "showError",
            UiEventKind::ShowWarningBanner { .. } => "showWarningBanner",
            UiEventKind::ShowThinking { .. } => "showThinking",
            UiEventKind::TokenUsage { .. } => "tokenUsage",
            UiEventKind::Unknown => "unknown",
        }
    }
}

/// One file entry of a `filesChanged` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangePayload {
    pub path: String,
    pub action: FileChangeAction,
    /// Files the backend pulled in implicitly as context; the consumer
    /// requests their full content out-of-band.
    #[serde(default)]
    pub implicit_context: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiffStat {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}
