//! Replay builder: reconstructs a timeline from a persisted session log.
//!
//! A pure function over the record array: no I/O, no reducer state, no
//! outbound requests. The builder keeps its own cursors but delegates
//! every structure-affecting decision (action identity, group
//! finalization, approval and file resolution) to [`threadline_core`]'s
//! shared rules, so replaying a log yields a timeline structurally
//! identical to what the live path produced while the log was written.

use threadline_core::event::{UiEvent, UiEventKind};
use threadline_core::files;
use threadline_core::log::{LogRecord, Role, decode_ui_record};
use threadline_core::merge;
use threadline_core::timeline::{
    ActionItem, Block, FilesChangedBlock, ProgressItem, TextBlock, Thread, ThinkingContent,
    ThinkingGroup, ThinkingSection, Timeline, TimelineItem, ToolItem, ToolsBlock, UserMessage,
};
use tracing::{debug, warn};

/// Rebuild the timeline for one stored session.
///
/// Malformed synthetic records are skipped with a warning; the session
/// scope is locked to the first session id seen among the UI records.
pub fn replay(records: &[LogRecord]) -> Timeline {
    let mut builder = ReplayBuilder::default();
    for record in records {
        builder.push_record(record);
    }
    builder.timeline
}

/// Replay cursor into the thread being built. Same shape as the live
/// path's context, maintained independently.
#[derive(Debug, Clone, Copy)]
struct Addr {
    block: usize,
    section: Option<usize>,
    item: usize,
}

#[derive(Debug, Default)]
struct ReplayBuilder {
    timeline: Timeline,
    thread: Option<usize>,
    thinking: Option<usize>,
    text: Option<usize>,
    progress: Option<Addr>,
    progress_stack: Vec<Addr>,
    session: Option<String>,
    active_model: Option<String>,
}

impl ReplayBuilder {
    fn push_record(&mut self, record: &LogRecord) {
        match record.role {
            Role::User => {
                self.timeline.items.push(TimelineItem::User(UserMessage::new(
                    record.content.clone().unwrap_or_default(),
                )));
                self.reset_cursors();
            }
            Role::Assistant => {
                if record.model.is_some() {
                    self.active_model = record.model.clone();
                }
                self.final_message(record.content.as_deref().unwrap_or_default());
                let thread = self.thread_mut();
                if thread.model.is_none() {
                    thread.model = record.model.clone();
                }
            }
            Role::Tool => {
                if !record.is_ui() {
                    return;
                }
                match decode_ui_record(record) {
                    Ok(event) => self.push_event(&event),
                    Err(error) => {
                        warn!(id = record.id.as_str(), %error, "skipping malformed record");
                    }
                }
            }
        }
    }

    fn push_event(&mut self, event: &UiEvent) {
        if !self.in_scope(event) {
            return;
        }
        match &event.kind {
            UiEventKind::StreamThinking { content } => self.stream_thinking(content),
            UiEventKind::CollapseThinking { duration_ms } => self.collapse_thinking(*duration_ms),
            UiEventKind::StreamChunk { content } => self.stream_chunk(content),
            UiEventKind::FinalMessage { content } => self.final_message(content),
            UiEventKind::StartProgressGroup { title, is_subagent } => {
                self.start_group(title, *is_subagent);
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
                self.tool_action(action);
            }
            UiEventKind::FinishProgressGroup => self.finish_group(),
            UiEventKind::SubagentThinking { content } => {
                if let Some(group) = self.resolve_group() {
                    merge::insert_subagent_note(group, content);
                }
            }
            UiEventKind::RequestToolApproval {
                approval_id,
                command,
                explanation,
            } => {
                self.push_tool_item(ToolItem::CommandApproval(
                    threadline_core::timeline::CommandApprovalItem {
                        approval_id: approval_id.clone(),
                        command: command.clone(),
                        explanation: explanation.clone(),
                        resolution: None,
                    },
                ));
                self.mirror_action(approval_id, command, None);
            }
            UiEventKind::RequestFileEditApproval {
                approval_id,
                file_path,
                diff,
            } => {
                self.push_tool_item(ToolItem::FileEditApproval(
                    threadline_core::timeline::FileEditApprovalItem {
                        approval_id: approval_id.clone(),
                        file_path: file_path.clone(),
                        diff: diff.clone(),
                        resolution: None,
                    },
                ));
                self.mirror_action(approval_id, file_path, Some(file_path.clone()));
            }
            UiEventKind::ToolApprovalResult {
                approval_id,
                approved,
            }
            | UiEventKind::FileEditApprovalResult {
                approval_id,
                approved,
            } => {
                let resolved = merge::find_approval_mut(&mut self.timeline, approval_id)
                    .map(|card| merge::resolve_card(card, *approved))
                    .is_some();
                if !resolved {
                    debug!(approval_id, "approval result without a request card");
                    let mut card = self.synthetic_card(&event.kind, approval_id);
                    merge::resolve_card(&mut card, *approved);
                    self.push_tool_item(card);
                }
                merge::resolve_approval_action(&mut self.timeline, approval_id, *approved);
            }
            UiEventKind::FilesChanged {
                checkpoint_id,
                files: payloads,
            } => {
                self.ensure_thread();
                if files::find_files_block_mut(&mut self.timeline).is_none() {
                    self.thread_mut()
                        .blocks
                        .push(Block::FilesChanged(FilesChangedBlock::empty()));
                }
                if let Some(block) = files::find_files_block_mut(&mut self.timeline) {
                    files::merge_checkpoint(block, checkpoint_id, payloads);
                }
            }
            UiEventKind::FilesDiffStats { stats, .. } => {
                if let Some(block) = files::find_files_block_mut(&mut self.timeline) {
                    files::apply_diff_stats(block, stats);
                }
            }
            UiEventKind::FileChangeResult { path, .. } => {
                if let Some(block) = files::find_files_block_mut(&mut self.timeline) {
                    files::resolve_file(block, path);
                }
                self.drop_files_block_if_empty();
            }
            UiEventKind::KeepUndoResult { checkpoint_id, .. } => {
                if let Some(block) = files::find_files_block_mut(&mut self.timeline) {
                    files::resolve_checkpoint(block, checkpoint_id);
                }
                self.drop_files_block_if_empty();
            }
            UiEventKind::ShowError { message } => self.show_error(message),
            UiEventKind::ShowWarningBanner { .. }
            | UiEventKind::ShowThinking { .. }
            | UiEventKind::TokenUsage { .. } => {}
            UiEventKind::Unknown => {
                debug!("ignoring unrecognized event type in log");
            }
        }
    }

    /// Scope lock: the first session-scoped record decides which session
    /// this log belongs to.
    fn in_scope(&mut self, event: &UiEvent) -> bool {
        if event.kind.is_chrome() {
            return true;
        }
        match (&self.session, &event.session_id) {
            (_, None) => true,
            (None, Some(session)) => {
                self.session = Some(session.clone());
                true
            }
            (Some(active), Some(session)) => active == session,
        }
    }

    fn reset_cursors(&mut self) {
        self.thread = None;
        self.thinking = None;
        self.text = None;
        self.progress = None;
        self.progress_stack.clear();
    }

    fn ensure_thread(&mut self) -> usize {
        if let Some(index) = self.thread {
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
        self.thread = Some(index);
        index
    }

    fn thread_mut(&mut self) -> &mut Thread {
        let index = self.ensure_thread();
        match self.timeline.items.get_mut(index) {
            Some(TimelineItem::Assistant(thread)) => thread,
            _ => unreachable!("ensure_thread just validated the index"),
        }
    }

    fn close_thinking(&mut self) {
        let Some(index) = self.thinking.take() else {
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

    fn stream_thinking(&mut self, content: &str) {
        self.ensure_thread();
        self.text = None;
        if self.thinking.is_none() {
            let thread = self.thread_mut();
            let index = thread.blocks.len();
            thread.blocks.push(Block::Thinking(ThinkingGroup::open()));
            self.thinking = Some(index);
        }
        let Some(index) = self.thinking else {
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
        let Some(index) = self.thinking else {
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
        group.streaming = false;
    }

    fn stream_chunk(&mut self, content: &str) {
        self.ensure_thread();
        self.close_thinking();
        if let Some(index) = self.text {
            if let Some(Block::Text(text)) = self.thread_mut().blocks.get_mut(index) {
                text.content = content.to_string();
                return;
            }
        }
        let thread = self.thread_mut();
        let index = thread.blocks.len();
        thread.blocks.push(Block::Text(TextBlock::streaming(content)));
        self.text = Some(index);
    }

    fn final_message(&mut self, content: &str) {
        self.ensure_thread();
        self.close_thinking();
        if let Some(index) = self.text.take() {
            if let Some(Block::Text(text)) = self.thread_mut().blocks.get_mut(index) {
                text.content = content.to_string();
                text.finalized = true;
                return;
            }
        }
        let thread = self.thread_mut();
        if let Some(Block::Text(text)) = thread.blocks.last_mut() {
            if text.finalized {
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

    fn start_group(&mut self, title: &str, is_subagent: bool) {
        self.ensure_thread();
        self.text = None;
        if let Some(active) = self.progress {
            if self.group_at(active).is_some() {
                self.progress_stack.push(active);
            }
        }
        let addr = self.open_group(ProgressItem::running(title, is_subagent));
        self.progress = Some(addr);
    }

    fn open_group(&mut self, group: ProgressItem) -> Addr {
        let thinking = self.thinking;
        let thread = self.thread_mut();

        if let Some(block) = thinking {
            if let Some(thinking_group) =
                thread.blocks.get_mut(block).and_then(Block::as_thinking_mut)
            {
                let section = if matches!(
                    thinking_group.sections.last(),
                    Some(ThinkingSection::Tools(_))
                ) {
                    thinking_group.sections.len() - 1
                } else {
                    thinking_group.sections.len()
                };
                let item = thinking_group.trailing_tools_mut().push_progress(group);
                return Addr {
                    block,
                    section: Some(section),
                    item,
                };
            }
        }
        if let Some(Block::Tools(tools)) = thread.blocks.last_mut() {
            let item = tools.push_progress(group);
            return Addr {
                block: thread.blocks.len() - 1,
                section: None,
                item,
            };
        }
        let mut tools = ToolsBlock::default();
        let item = tools.push_progress(group);
        let block = thread.blocks.len();
        thread.blocks.push(Block::Tools(tools));
        Addr {
            block,
            section: None,
            item,
        }
    }

    fn group_at(&mut self, addr: Addr) -> Option<&mut ProgressItem> {
        let thread = self.thread_mut();
        let block = thread.blocks.get_mut(addr.block)?;
        let tools = match (block, addr.section) {
            (Block::Tools(tools), None) => tools,
            (Block::Thinking(group), Some(section)) => match group.sections.get_mut(section)? {
                ThinkingSection::Tools(tools) => tools,
                _ => return None,
            },
            _ => return None,
        };
        tools.progress_mut(addr.item)
    }

    /// Cursor fast path, then the shared last-running scan.
    fn resolve_group(&mut self) -> Option<&mut ProgressItem> {
        if let Some(addr) = self.progress {
            // Two probes to keep the borrows sequential.
            if self.group_at(addr).is_some() {
                return self.group_at(addr);
            }
        }
        merge::last_running_group_mut(&mut self.thread_mut().blocks)
    }

    fn tool_action(&mut self, action: ActionItem) {
        self.ensure_thread();
        self.text = None;
        if let Some(group) = self.resolve_group() {
            merge::merge_tool_action(group, action);
            return;
        }
        let addr = self.open_group(ProgressItem::running("Working on task", false));
        self.progress = Some(addr);
        if let Some(group) = self.group_at(addr) {
            merge::merge_tool_action(group, action);
        }
    }

    fn finish_group(&mut self) {
        if let Some(addr) = self.progress.take() {
            self.progress = self.progress_stack.pop();
            if let Some(group) = self.group_at(addr) {
                merge::finish_progress_group(group);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            merge::finish_progress_group(group);
        }
    }

    fn show_error(&mut self, message: &str) {
        if let Some(addr) = self.progress.take() {
            self.progress = self.progress_stack.pop();
            if let Some(group) = self.group_at(addr) {
                merge::fail_progress_group(group, message);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            merge::fail_progress_group(group, message);
            return;
        }
        let addr = self.open_group(ProgressItem::running("Working on task", false));
        if let Some(group) = self.group_at(addr) {
            merge::fail_progress_group(group, message);
        }
    }

    fn push_tool_item(&mut self, item: ToolItem) {
        self.ensure_thread();
        let thinking = self.thinking;
        let thread = self.thread_mut();
        if let Some(block) = thinking {
            if let Some(group) = thread.blocks.get_mut(block).and_then(Block::as_thinking_mut) {
                group.trailing_tools_mut().items.push(item);
                return;
            }
        }
        if let Some(Block::Tools(tools)) = thread.blocks.last_mut() {
            tools.items.push(item);
            return;
        }
        let mut tools = ToolsBlock::default();
        tools.items.push(item);
        thread.blocks.push(Block::Tools(tools));
    }

    fn mirror_action(&mut self, approval_id: &str, text: &str, file_path: Option<String>) {
        let mut action = ActionItem::new(
            threadline_core::timeline::ActionStatus::Pending,
            text,
        );
        action.approval_id = Some(approval_id.to_string());
        action.file_path = file_path;
        if let Some(group) = self.resolve_group() {
            group.actions.push(action);
            group.last_action_status =
                Some(threadline_core::timeline::ActionStatus::Pending);
        }
    }

    fn synthetic_card(&self, kind: &UiEventKind, approval_id: &str) -> ToolItem {
        match kind {
            UiEventKind::FileEditApprovalResult { .. } => ToolItem::FileEditApproval(
                threadline_core::timeline::FileEditApprovalItem {
                    approval_id: approval_id.to_string(),
                    file_path: String::new(),
                    diff: None,
                    resolution: None,
                },
            ),
            _ => ToolItem::CommandApproval(threadline_core::timeline::CommandApprovalItem {
                approval_id: approval_id.to_string(),
                command: String::new(),
                explanation: None,
                resolution: None,
            }),
        }
    }

    fn drop_files_block_if_empty(&mut self) {
        if !files::find_files_block_mut(&mut self.timeline)
            .map(|block| block.is_empty())
            .unwrap_or(false)
        {
            return;
        }
        let found = self.timeline.items.iter().enumerate().find_map(|(index, item)| {
            let TimelineItem::Assistant(thread) = item else {
                return None;
            };
            thread
                .blocks
                .iter()
                .position(|block| matches!(block, Block::FilesChanged(_)))
                .map(|block_index| (index, block_index))
        });
        let Some((item_index, block_index)) = found else {
            return;
        };
        if let Some(TimelineItem::Assistant(thread)) = self.timeline.items.get_mut(item_index) {
            thread.blocks.remove(block_index);
        }
        if self.thread == Some(item_index) {
            self.shift_after_block_removal(block_index);
        }
    }

    fn shift_after_block_removal(&mut self, removed: usize) {
        let fix = |index: &mut Option<usize>| match *index {
            Some(value) if value == removed => *index = None,
            Some(value) if value > removed => *index = Some(value - 1),
            _ => {}
        };
        fix(&mut self.thinking);
        fix(&mut self.text);
        if let Some(addr) = self.progress.as_mut() {
            if addr.block > removed {
                addr.block -= 1;
            }
        }
        for addr in &mut self.progress_stack {
            if addr.block > removed {
                addr.block -= 1;
            }
        }
    }
}
