//! The live reducer: applies exactly one event at a time to the in-memory
//! timeline.
//!
//! Single-threaded and cooperative by construction: `apply` takes `&mut
//! self`, fully reduces one event, and never blocks. Latency-bearing work
//! is queued as an [`OutboundRequest`](crate::outbound::OutboundRequest)
//! and its result arrives later as its own event.

use threadline_core::event::{UiEvent, UiEventKind};
use threadline_core::timeline::{
    ActionItem, Block, ProgressItem, TextBlock, Thread, ThinkingContent, ThinkingGroup,
    ThinkingSection, Timeline, TimelineItem, UserMessage,
};
use tracing::debug;

use crate::context::{GroupAddr, ReducerContext};
use crate::outbound::OutboundRequest;

#[derive(Debug, Default)]
pub struct TimelineReducer {
    pub(crate) timeline: Timeline,
    pub(crate) ctx: ReducerContext,
    session_id: Option<String>,
    active_model: Option<String>,
    pub(crate) outbound: Vec<OutboundRequest>,
}

impl TimelineReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// Switch the active session. All cursor state clears atomically; the
    /// timeline itself is kept (the host swaps timelines per session).
    pub fn set_session(&mut self, session_id: Option<String>) {
        if self.session_id != session_id {
            self.session_id = session_id;
            self.ctx.reset();
        }
    }

    /// Model name stamped onto threads created from here on (first-wins
    /// per thread).
    pub fn set_active_model(&mut self, model: Option<String>) {
        self.active_model = model;
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundRequest> {
        std::mem::take(&mut self.outbound)
    }

    /// A new user message starts a new timeline item and ends the current
    /// assistant turn: every cursor clears together.
    pub fn push_user_message(&mut self, content: impl Into<String>) {
        self.timeline
            .items
            .push(TimelineItem::User(UserMessage::new(content)));
        self.ctx.reset();
    }

    /// Apply one event. Session-mismatched events are a normal no-op.
    pub fn apply(&mut self, event: &UiEvent) {
        if !event.targets(self.session_id.as_deref()) {
            debug!(
                event = event.kind.name(),
                session = event.session_id.as_deref(),
                "skipping event for foreign session"
            );
            return;
        }

        match &event.kind {
            UiEventKind::StreamThinking { content } => self.stream_thinking(content),
            UiEventKind::CollapseThinking { duration_ms } => self.collapse_thinking(*duration_ms),
            UiEventKind::StreamChunk { content } => self.stream_chunk(content),
            UiEventKind::FinalMessage { content } => self.final_message(content),
            UiEventKind::StartProgressGroup { title, is_subagent } => {
                self.start_progress_group(title, *is_subagent);
            }
            UiEventKind::ShowToolAction {
                status,
                icon,
                text,
                detail,
                file_path,
                checkpoint_id,
                start_line,
            } => {
                let mut action = ActionItem::new(*status, text.clone());
                action.icon = icon.clone();
                action.detail = detail.clone();
                action.file_path = file_path.clone();
                action.checkpoint_id = checkpoint_id.clone();
                action.start_line = *start_line;
                self.show_tool_action(action);
            }
            UiEventKind::FinishProgressGroup => self.finish_progress_group(),
            UiEventKind::SubagentThinking { content } => self.subagent_thinking(content),
            UiEventKind::RequestToolApproval {
                approval_id,
                command,
                explanation,
            } => self.request_tool_approval(approval_id, command, explanation.clone()),
            UiEventKind::ToolApprovalResult {
                approval_id,
                approved,
            } => self.tool_approval_result(approval_id, *approved),
            UiEventKind::RequestFileEditApproval {
                approval_id,
                file_path,
                diff,
            } => self.request_file_edit_approval(approval_id, file_path, diff.clone()),
            UiEventKind::FileEditApprovalResult {
                approval_id,
                approved,
            } => self.file_edit_approval_result(approval_id, *approved),
            UiEventKind::FilesChanged {
                checkpoint_id,
                files,
            } => self.files_changed(checkpoint_id, files),
            UiEventKind::FilesDiffStats { stats, .. } => self.files_diff_stats(stats),
            UiEventKind::FileChangeResult { path, .. } => self.file_change_result(path),
            UiEventKind::KeepUndoResult { checkpoint_id, .. } => {
                self.keep_undo_result(checkpoint_id);
            }
            UiEventKind::ShowError { message } => self.show_error(message),
            UiEventKind::ShowWarningBanner { message } => {
                debug!(message = message.as_str(), "warning banner");
            }
            // Chrome: transient UI state only, no timeline structure.
            UiEventKind::ShowThinking { .. } | UiEventKind::TokenUsage { .. } => {}
            UiEventKind::Unknown => {
                debug!("ignoring unrecognized event type");
            }
        }
    }

    // ── Thread and cursor plumbing ──────────────────────────────────────

    pub(crate) fn ensure_thread(&mut self) -> usize {
        if let Some(index) = self.ctx.thread {
            if self.timeline.thread(index).is_some() {
                return index;
            }
        }
        let index = self.timeline.items.len();
        self.timeline
            .items
            .push(TimelineItem::Assistant(Thread::new(
                self.active_model.clone(),
            )));
        self.ctx.thread = Some(index);
        index
    }

    pub(crate) fn thread_mut(&mut self) -> &mut Thread {
        let index = self.ensure_thread();
        match self.timeline.items.get_mut(index) {
            Some(TimelineItem::Assistant(thread)) => thread,
            _ => unreachable!("ensure_thread just validated the index"),
        }
    }

    fn close_thinking(&mut self) {
        let Some(index) = self.ctx.thinking.take() else {
            return;
        };
        if let Some(group) = self
            .thread_mut()
            .blocks
            .get_mut(index)
            .and_then(Block::as_thinking_mut)
        {
            group.close();
        }
    }

    // ── Thinking stream ─────────────────────────────────────────────────

    fn stream_thinking(&mut self, content: &str) {
        self.ensure_thread();
        // Thinking is a boundary: the next chunk starts a fresh text block.
        self.ctx.text = None;

        if self.ctx.thinking.is_none() {
            let thread = self.thread_mut();
            let index = thread.blocks.len();
            thread.blocks.push(Block::Thinking(ThinkingGroup::open()));
            self.ctx.thinking = Some(index);
        }

        let Some(index) = self.ctx.thinking else {
            return;
        };
        let Some(group) = self
            .thread_mut()
            .blocks
            .get_mut(index)
            .and_then(Block::as_thinking_mut)
        else {
            return;
        };
        match group.open_content_mut() {
            Some(section) => section.content.push_str(content),
            None => group
                .sections
                .push(ThinkingSection::Thinking(ThinkingContent::streaming(
                    content,
                ))),
        }
        group.streaming = true;
    }

    fn collapse_thinking(&mut self, duration_ms: Option<u64>) {
        let Some(index) = self.ctx.thinking else {
            return;
        };
        let Some(group) = self
            .thread_mut()
            .blocks
            .get_mut(index)
            .and_then(Block::as_thinking_mut)
        else {
            return;
        };
        if let Some(section) = group.open_content_mut() {
            section.sealed = true;
            section.duration_ms = duration_ms;
        }
        // The group itself stays open for further sections.
        group.streaming = false;
    }

    // ── Thread-level text ───────────────────────────────────────────────

    fn stream_chunk(&mut self, content: &str) {
        self.ensure_thread();
        self.close_thinking();

        if let Some(index) = self.ctx.text {
            if let Some(Block::Text(text)) = self.thread_mut().blocks.get_mut(index) {
                // Replace, not concatenate: chunks carry the full text so far.
                text.content = content.to_string();
                return;
            }
        }
        let thread = self.thread_mut();
        let index = thread.blocks.len();
        thread.blocks.push(Block::Text(TextBlock::streaming(content)));
        self.ctx.text = Some(index);
    }

    fn final_message(&mut self, content: &str) {
        self.ensure_thread();
        self.close_thinking();

        if let Some(index) = self.ctx.text.take() {
            if let Some(Block::Text(text)) = self.thread_mut().blocks.get_mut(index) {
                text.content = content.to_string();
                text.finalized = true;
                return;
            }
        }

        let thread = self.thread_mut();
        if let Some(Block::Text(text)) = thread.blocks.last_mut() {
            if text.finalized {
                // Final summary after an already-final answer: append with
                // a blank-line separator.
                text.content.push_str("\n\n");
                text.content.push_str(content);
                return;
            }
        }
        thread.blocks.push(Block::Text(TextBlock {
            content: content.to_string(),
            finalized: true,
        }));
    }
}

// ── Addressing helpers shared by the handler modules ────────────────────

pub(crate) fn progress_at(thread: &mut Thread, addr: GroupAddr) -> Option<&mut ProgressItem> {
    let block = thread.blocks.get_mut(addr.block)?;
    let tools = match (block, addr.section) {
        (Block::Tools(tools), None) => tools,
        (Block::Thinking(group), Some(section)) => {
            match group.sections.get_mut(section)? {
                ThinkingSection::Tools(tools) => tools,
                _ => return None,
            }
        }
        _ => return None,
    };
    tools.progress_mut(addr.item)
}

pub(crate) fn progress_exists(thread: &Thread, addr: GroupAddr) -> bool {
    let Some(block) = thread.blocks.get(addr.block) else {
        return false;
    };
    let tools = match (block, addr.section) {
        (Block::Tools(tools), None) => tools,
        (Block::Thinking(group), Some(section)) => match group.sections.get(section) {
            Some(ThinkingSection::Tools(tools)) => tools,
            _ => return false,
        },
        _ => return false,
    };
    matches!(
        tools.items.get(addr.item),
        Some(threadline_core::timeline::ToolItem::Progress(_))
    )
}
