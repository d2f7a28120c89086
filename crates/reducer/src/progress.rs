//! Progress-group handlers: opening, tool-step merging, finishing, and
//! the error path.
//!
//! Group resolution is a heuristic chain: the cursor first, then the most
//! recent `running` group anywhere in the thread, then an implicit group
//! as a last resort. Structure-affecting decisions delegate to
//! [`threadline_core::merge`].

use threadline_core::merge;
use threadline_core::timeline::{ActionItem, Block, ProgressItem, ToolsBlock};
use tracing::debug;

use crate::context::GroupAddr;
use crate::reducer::{TimelineReducer, progress_at, progress_exists};

const IMPLICIT_GROUP_TITLE: &str = "Working on task";

impl TimelineReducer {
    /// Open a new progress group in the active tools container. If a group
    /// is already active its cursor is saved on the stack, so a sub-agent
    /// can nest and `finishProgressGroup` unwinds symmetrically.
    pub(crate) fn start_progress_group(&mut self, title: &str, is_subagent: bool) {
        self.ensure_thread();
        self.ctx.text = None;

        if let Some(active) = self.ctx.progress {
            if progress_exists(self.thread_mut(), active) {
                self.ctx.progress_stack.push(active);
            }
        }
        let addr = self.open_group(ProgressItem::running(title, is_subagent));
        self.ctx.progress = Some(addr);
    }

    /// Push a fresh group into the tools container the cursor points at:
    /// the open thinking group's trailing tools section when thinking is
    /// active, otherwise the trailing thread-level tools block.
    fn open_group(&mut self, group: ProgressItem) -> GroupAddr {
        let thinking = self.ctx.thinking;
        let thread = self.thread_mut();

        if let Some(block) = thinking {
            if let Some(thinking_group) = thread.blocks.get_mut(block).and_then(Block::as_thinking_mut) {
                let section = if matches!(
                    thinking_group.sections.last(),
                    Some(threadline_core::timeline::ThinkingSection::Tools(_))
                ) {
                    thinking_group.sections.len() - 1
                } else {
                    thinking_group.sections.len()
                };
                let item = thinking_group.trailing_tools_mut().push_progress(group);
                return GroupAddr {
                    block,
                    section: Some(section),
                    item,
                };
            }
        }

        if let Some(Block::Tools(tools)) = thread.blocks.last_mut() {
            let item = tools.push_progress(group);
            return GroupAddr {
                block: thread.blocks.len() - 1,
                section: None,
                item,
            };
        }

        let mut tools = ToolsBlock::default();
        let item = tools.push_progress(group);
        let block = thread.blocks.len();
        thread.blocks.push(Block::Tools(tools));
        GroupAddr {
            block,
            section: None,
            item,
        }
    }

    pub(crate) fn show_tool_action(&mut self, action: ActionItem) {
        self.ensure_thread();
        self.ctx.text = None;

        if let Some(addr) = self.ctx.progress {
            if let Some(group) = progress_at(self.thread_mut(), addr) {
                merge::merge_tool_action(group, action);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            merge::merge_tool_action(group, action);
            return;
        }

        // No group anywhere: open an implicit one rather than drop the step.
        debug!("tool action without an open group, creating implicit group");
        let addr = self.open_group(ProgressItem::running(IMPLICIT_GROUP_TITLE, false));
        self.ctx.progress = Some(addr);
        if let Some(group) = progress_at(self.thread_mut(), addr) {
            merge::merge_tool_action(group, action);
        }
    }

    pub(crate) fn finish_progress_group(&mut self) {
        if let Some(addr) = self.ctx.progress.take() {
            self.ctx.progress = self.ctx.progress_stack.pop();
            if let Some(group) = progress_at(self.thread_mut(), addr) {
                merge::finish_progress_group(group);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            merge::finish_progress_group(group);
        } else {
            debug!("finishProgressGroup with no group to finish");
        }
    }

    pub(crate) fn show_error(&mut self, message: &str) {
        if let Some(addr) = self.ctx.progress.take() {
            self.ctx.progress = self.ctx.progress_stack.pop();
            if let Some(group) = progress_at(self.thread_mut(), addr) {
                merge::fail_progress_group(group, message);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            merge::fail_progress_group(group, message);
            return;
        }
        let addr = self.open_group(ProgressItem::running(IMPLICIT_GROUP_TITLE, false));
        if let Some(group) = progress_at(self.thread_mut(), addr) {
            merge::fail_progress_group(group, message);
        }
    }

    pub(crate) fn subagent_thinking(&mut self, content: &str) {
        if let Some(addr) = self.ctx.progress {
            if let Some(group) = progress_at(self.thread_mut(), addr) {
                merge::insert_subagent_note(group, content);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            merge::insert_subagent_note(group, content);
        } else {
            debug!("subagent thinking with no open group");
        }
    }
}
