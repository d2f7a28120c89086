//! Approval handlers: interactive cards plus their mirrored actions.
//!
//! A request renders two things: a card in the active tools container and
//! a synthetic `pending` action inside the active progress group, linked
//! by `approval_id`. The result event resolves both, wherever they ended
//! up (the user can answer long after the group closed).

use threadline_core::merge;
use threadline_core::timeline::{
    ActionItem, ActionStatus, Block, CommandApprovalItem, FileEditApprovalItem, ToolItem,
};
use tracing::debug;

use crate::reducer::{TimelineReducer, progress_at};

impl TimelineReducer {
    pub(crate) fn request_tool_approval(
        &mut self,
        approval_id: &str,
        command: &str,
        explanation: Option<String>,
    ) {
        self.ensure_thread();
        self.push_tool_item(ToolItem::CommandApproval(CommandApprovalItem {
            approval_id: approval_id.to_string(),
            command: command.to_string(),
            explanation,
            resolution: None,
        }));
        self.mirror_pending_action(approval_id, command, None);
    }

    pub(crate) fn request_file_edit_approval(
        &mut self,
        approval_id: &str,
        file_path: &str,
        diff: Option<String>,
    ) {
        self.ensure_thread();
        self.push_tool_item(ToolItem::FileEditApproval(FileEditApprovalItem {
            approval_id: approval_id.to_string(),
            file_path: file_path.to_string(),
            diff,
            resolution: None,
        }));
        self.mirror_pending_action(approval_id, file_path, Some(file_path.to_string()));
    }

    pub(crate) fn tool_approval_result(&mut self, approval_id: &str, approved: bool) {
        self.resolve_approval(approval_id, approved, |id| {
            ToolItem::CommandApproval(CommandApprovalItem {
                approval_id: id.to_string(),
                command: String::new(),
                explanation: None,
                resolution: None,
            })
        });
    }

    pub(crate) fn file_edit_approval_result(&mut self, approval_id: &str, approved: bool) {
        self.resolve_approval(approval_id, approved, |id| {
            ToolItem::FileEditApproval(FileEditApprovalItem {
                approval_id: id.to_string(),
                file_path: String::new(),
                diff: None,
                resolution: None,
            })
        });
    }

    fn resolve_approval(
        &mut self,
        approval_id: &str,
        approved: bool,
        synthesize: impl FnOnce(&str) -> ToolItem,
    ) {
        let resolved = merge::find_approval_mut(&mut self.timeline, approval_id)
            .map(|card| merge::resolve_card(card, approved))
            .is_some();
        if !resolved {
            // Result for a card that never rendered (lossy stream,
            // truncated log): materialize it already resolved.
            debug!(approval_id, "approval result without a request card");
            let mut card = synthesize(approval_id);
            merge::resolve_card(&mut card, approved);
            self.push_tool_item(card);
        }
        merge::resolve_approval_action(&mut self.timeline, approval_id, approved);
    }

    /// Append a tool item to the active tools container without moving the
    /// progress cursor: the open thinking group's trailing tools section,
    /// else the trailing thread-level tools block, else a fresh one.
    fn push_tool_item(&mut self, item: ToolItem) {
        let thinking = self.ctx.thinking;
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
        let mut tools = threadline_core::timeline::ToolsBlock::default();
        tools.items.push(item);
        thread.blocks.push(Block::Tools(tools));
    }

    fn mirror_pending_action(&mut self, approval_id: &str, text: &str, file_path: Option<String>) {
        let mut action = ActionItem::new(ActionStatus::Pending, text);
        action.approval_id = Some(approval_id.to_string());
        action.file_path = file_path;

        if let Some(addr) = self.ctx.progress {
            if let Some(group) = progress_at(self.thread_mut(), addr) {
                group.actions.push(action);
                group.last_action_status = Some(ActionStatus::Pending);
                return;
            }
        }
        if let Some(group) = merge::last_running_group_mut(&mut self.thread_mut().blocks) {
            group.actions.push(action);
            group.last_action_status = Some(ActionStatus::Pending);
        } else {
            debug!(approval_id, "approval request with no group to mirror into");
        }
    }
}
