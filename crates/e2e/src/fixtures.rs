//! Canned event scripts covering the realistic session shapes the
//! parity suite exercises.

use threadline_core::event::{FileChangePayload, FileDiffStat, UiEventKind};
use threadline_core::timeline::{ActionStatus, FileChangeAction};

use crate::Script;

fn action(status: ActionStatus, text: &str) -> UiEventKind {
    UiEventKind::ShowToolAction {
        status,
        icon: None,
        text: text.to_string(),
        detail: None,
        file_path: None,
        checkpoint_id: None,
        start_line: None,
    }
}

fn start(title: &str) -> UiEventKind {
    UiEventKind::StartProgressGroup {
        title: title.to_string(),
        is_subagent: false,
    }
}

fn thinking(content: &str) -> UiEventKind {
    UiEventKind::StreamThinking {
        content: content.to_string(),
    }
}

/// Thinking, a tool round inside it, thinking resumed, then the answer:
/// one collapsed group with three sections plus a thread-level text block.
pub fn interleaved_thinking() -> Script {
    Script::new()
        .user("read x.ts and summarize it")
        .event(thinking("a"))
        .event(UiEventKind::CollapseThinking {
            duration_ms: Some(900),
        })
        .event(start("Reading"))
        .event(action(ActionStatus::Success, "Read x.ts"))
        .event(UiEventKind::FinishProgressGroup)
        .event(thinking("b"))
        .event(UiEventKind::CollapseThinking {
            duration_ms: Some(400),
        })
        .event(UiEventKind::StreamChunk {
            content: "answer".to_string(),
        })
        .final_answer("answer")
}

/// A sub-agent nested inside an outer group, with its own reasoning notes.
pub fn nested_subagent() -> Script {
    Script::new()
        .user("refactor the parser")
        .event(start("Refactoring"))
        .event(action(ActionStatus::Running, "Scanning modules"))
        .event(UiEventKind::StartProgressGroup {
            title: "Explore codebase".to_string(),
            is_subagent: true,
        })
        .event(UiEventKind::SubagentThinking {
            content: "the grammar lives in two files".to_string(),
        })
        .event(action(ActionStatus::Success, "Read grammar.rs"))
        .event(UiEventKind::FinishProgressGroup)
        .event(action(ActionStatus::Success, "Scanned modules"))
        .event(UiEventKind::FinishProgressGroup)
        .final_answer("refactored")
}

/// Command approval requested mid-thinking, denied after the group ended.
pub fn denied_approval() -> Script {
    Script::for_session("s-approve")
        .user("clean the build dir")
        .event(thinking("this needs a shell command"))
        .event(start("Shell"))
        .event(UiEventKind::RequestToolApproval {
            approval_id: "ap-1".to_string(),
            command: "rm -rf target".to_string(),
            explanation: Some("removes build artifacts".to_string()),
        })
        .event(UiEventKind::FinishProgressGroup)
        .event(UiEventKind::ToolApprovalResult {
            approval_id: "ap-1".to_string(),
            approved: false,
        })
        .final_answer("stopped: permission denied")
}

/// File-edit approval that gets accepted.
pub fn approved_file_edit() -> Script {
    Script::new()
        .user("fix the off-by-one")
        .event(start("Editing"))
        .event(UiEventKind::RequestFileEditApproval {
            approval_id: "ap-2".to_string(),
            file_path: "src/scan.rs".to_string(),
            diff: Some("-len\n+len - 1".to_string()),
        })
        .event(UiEventKind::FileEditApprovalResult {
            approval_id: "ap-2".to_string(),
            approved: true,
        })
        .event(UiEventKind::FinishProgressGroup)
        .final_answer("fixed")
}

/// Two checkpoints merging into the singleton, stats arriving, one file
/// kept individually, the rest resolved in bulk.
pub fn files_lifecycle() -> Script {
    Script::new()
        .user("apply the migration")
        .event(UiEventKind::FilesChanged {
            checkpoint_id: "cp-1".to_string(),
            files: vec![
                file("src/db.rs", FileChangeAction::Modified),
                file("migrations/0002.sql", FileChangeAction::Created),
            ],
        })
        .event(UiEventKind::FilesDiffStats {
            checkpoint_id: "cp-1".to_string(),
            stats: vec![
                stat("src/db.rs", 12, 3),
                stat("migrations/0002.sql", 40, 0),
            ],
        })
        .event(UiEventKind::FilesChanged {
            checkpoint_id: "cp-2".to_string(),
            files: vec![file("src/db.rs", FileChangeAction::Modified)],
        })
        .event(UiEventKind::FileChangeResult {
            path: "migrations/0002.sql".to_string(),
            kept: true,
        })
        .event(UiEventKind::KeepUndoResult {
            checkpoint_id: "cp-2".to_string(),
            kept: true,
        })
        .final_answer("migration applied")
}

/// An upstream failure mid-group.
pub fn upstream_error() -> Script {
    Script::new()
        .user("deploy it")
        .event(start("Deploying"))
        .event(action(ActionStatus::Running, "Pushing image"))
        .event(UiEventKind::ShowError {
            message: "registry unreachable".to_string(),
        })
        .final_answer("deploy failed, see above")
}

/// Two full turns with a model announcement, chrome noise, and an event
/// leaked from a concurrent session that both paths must ignore. The
/// foreign event sits after the session's own first scoped event, as it
/// would in a real multiplexed stream.
pub fn multi_turn() -> Script {
    Script::for_session("s-main")
        .model("sonnet")
        .user("first question")
        .event(thinking("short"))
        .foreign_event(
            "s-other",
            UiEventKind::StreamChunk {
                content: "foreign".to_string(),
            },
        )
        .event(UiEventKind::CollapseThinking { duration_ms: None })
        .final_answer("first answer")
        .user("second question")
        .event(UiEventKind::ShowThinking { active: true })
        .event(UiEventKind::TokenUsage {
            input_tokens: 900,
            output_tokens: 120,
        })
        .event(UiEventKind::StreamChunk {
            content: "second".to_string(),
        })
        .final_answer("second answer")
}

fn file(path: &str, action: FileChangeAction) -> FileChangePayload {
    FileChangePayload {
        path: path.to_string(),
        action,
        implicit_context: false,
    }
}

fn stat(path: &str, additions: u64, deletions: u64) -> FileDiffStat {
    FileDiffStat {
        path: path.to_string(),
        additions,
        deletions,
    }
}
