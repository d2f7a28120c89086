use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The rendered conversation: an ordered list of user messages and
/// assistant threads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub items: Vec<TimelineItem>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assistant thread at `index`, if that item is a thread.
    pub fn thread_mut(&mut self, index: usize) -> Option<&mut Thread> {
        match self.items.get_mut(index) {
            Some(TimelineItem::Assistant(thread)) => Some(thread),
            _ => None,
        }
    }

    pub fn thread(&self, index: usize) -> Option<&Thread> {
        match self.items.get(index) {
            Some(TimelineItem::Assistant(thread)) => Some(thread),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimelineItem {
    User(UserMessage),
    Assistant(Thread),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl UserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            content: content.into(),
        }
    }
}

/// One continuous assistant turn: an ordered block sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub blocks: Vec<Block>,
}

impl Thread {
    pub fn new(model: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            model,
            blocks: Vec::new(),
        }
    }
}

/// A thread-level unit. Final-answer text is always a thread-level block;
/// it is never nested inside a thinking group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Block {
    Text(TextBlock),
    Thinking(ThinkingGroup),
    Tools(ToolsBlock),
    FilesChanged(FilesChangedBlock),
}

impl Block {
    pub fn as_tools_mut(&mut self) -> Option<&mut ToolsBlock> {
        match self {
            Block::Tools(tools) => Some(tools),
            _ => None,
        }
    }

    pub fn as_thinking_mut(&mut self) -> Option<&mut ThinkingGroup> {
        match self {
            Block::Thinking(group) => Some(group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub content: String,
    /// Set once the content came from a `finalMessage`. A later final
    /// message appends with a blank-line separator instead of replacing.
    #[serde(default)]
    pub finalized: bool,
}

impl TextBlock {
    pub fn streaming(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finalized: false,
        }
    }
}

/// Collapsible aggregation of consecutive reasoning and tool sections.
/// Closes the moment thread-level text is emitted; thinking that resumes
/// afterward opens a fresh sibling group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingGroup {
    pub sections: Vec<ThinkingSection>,
    pub collapsed: bool,
    pub streaming: bool,
}

impl ThinkingGroup {
    pub fn open() -> Self {
        Self {
            sections: Vec::new(),
            collapsed: false,
            streaming: true,
        }
    }

    /// The trailing content section, if it has not been sealed yet.
    pub fn open_content_mut(&mut self) -> Option<&mut ThinkingContent> {
        match self.sections.last_mut() {
            Some(ThinkingSection::Thinking(content)) if !content.sealed => Some(content),
            _ => None,
        }
    }

    /// The trailing tools section, creating one if the group does not
    /// end in tools.
    pub fn trailing_tools_mut(&mut self) -> &mut ToolsBlock {
        if !matches!(self.sections.last(), Some(ThinkingSection::Tools(_))) {
            self.sections.push(ThinkingSection::Tools(ToolsBlock::default()));
        }
        match self.sections.last_mut() {
            Some(ThinkingSection::Tools(tools)) => tools,
            _ => unreachable!("trailing section was just pushed"),
        }
    }

    pub fn close(&mut self) {
        self.collapsed = true;
        self.streaming = false;
    }
}

/// A thinking-group section is reasoning text or a run of tool activity,
/// never thread-level answer text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ThinkingSection {
    Thinking(ThinkingContent),
    Tools(ToolsBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingContent {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// A sealed section no longer accepts appended content; thinking that
    /// resumes afterward starts a new section.
    #[serde(default)]
    pub sealed: bool,
}

impl ThinkingContent {
    pub fn streaming(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            duration_ms: None,
            sealed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsBlock {
    pub items: Vec<ToolItem>,
}

impl ToolsBlock {
    pub fn push_progress(&mut self, group: ProgressItem) -> usize {
        self.items.push(ToolItem::Progress(group));
        self.items.len() - 1
    }

    pub fn progress_mut(&mut self, index: usize) -> Option<&mut ProgressItem> {
        match self.items.get_mut(index) {
            Some(ToolItem::Progress(group)) => Some(group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ToolItem {
    Progress(ProgressItem),
    CommandApproval(CommandApprovalItem),
    FileEditApproval(FileEditApprovalItem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Done,
    Error,
}

/// One logical tool-invocation round with its action steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressItem {
    pub title: String,
    pub status: ProgressStatus,
    pub collapsed: bool,
    pub actions: Vec<ActionItem>,
    #[serde(default)]
    pub is_subagent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_status: Option<ActionStatus>,
}

impl ProgressItem {
    pub fn running(title: impl Into<String>, is_subagent: bool) -> Self {
        Self {
            title: title.into(),
            status: ProgressStatus::Running,
            collapsed: false,
            actions: Vec::new(),
            is_subagent,
            last_action_status: None,
        }
    }

    /// Group status law: `Error` iff any action errored.
    pub fn has_error_action(&self) -> bool {
        self.actions
            .iter()
            .any(|action| action.status == ActionStatus::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionStatus::Success | ActionStatus::Error)
    }

    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

/// A single tool step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    /// Synthetic id linking this action to an approval card, so the
    /// approval's resolution event can complete it later.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
}

impl ActionItem {
    pub fn new(status: ActionStatus, text: impl Into<String>) -> Self {
        Self {
            status,
            icon: None,
            text: text.into(),
            detail: None,
            file_path: None,
            checkpoint_id: None,
            start_line: None,
            approval_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalResolution {
    Approved,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandApprovalItem {
    pub approval_id: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ApprovalResolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEditApprovalItem {
    pub approval_id: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ApprovalResolution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeAction {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeStatus {
    Pending,
    Kept,
    Undone,
}

/// At most one per timeline: aggregated pending file edits across
/// checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesChangedBlock {
    pub checkpoint_ids: BTreeSet<String>,
    pub files: Vec<FileChangeFileItem>,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub loading: bool,
}

impl FilesChangedBlock {
    pub fn empty() -> Self {
        Self {
            checkpoint_ids: BTreeSet::new(),
            files: Vec::new(),
            total_additions: 0,
            total_deletions: 0,
            loading: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeFileItem {
    pub path: String,
    pub action: FileChangeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
    pub status: FileChangeStatus,
    pub checkpoint_id: String,
}
