//! Merge and identity rules shared by the live reducer and the replay
//! builder.
//!
//! Both consumers keep their own cursor bookkeeping; every decision that
//! affects the resulting structure (action identity, group finalization,
//! approval resolution) lives here so the two paths cannot drift.

use crate::timeline::{
    ActionItem, ActionStatus, ApprovalResolution, Block, ProgressItem, ProgressStatus,
    ThinkingSection, Timeline, TimelineItem, ToolItem, ToolsBlock,
};

/// Merge one tool-action step into a progress group.
///
/// Identity is `(text, still-open)`, not a stable id: an open action with
/// the same text is updated in place. A terminal incoming status with no
/// text match resolves the most recent still-open action instead, taking
/// over its wording. Anything else appends.
pub fn merge_tool_action(group: &mut ProgressItem, incoming: ActionItem) {
    let applied = incoming.status;

    if let Some(existing) = group
        .actions
        .iter_mut()
        .rev()
        .find(|action| action.text == incoming.text && action.status.is_open())
    {
        update_action(existing, incoming);
    } else if applied.is_terminal() {
        if let Some(open) = group
            .actions
            .iter_mut()
            .rev()
            .find(|action| action.status.is_open() && action.approval_id.is_none())
        {
            update_action(open, incoming);
        } else {
            group.actions.push(incoming);
        }
    } else {
        group.actions.push(incoming);
    }

    group.last_action_status = Some(applied);
    if applied == ActionStatus::Error {
        group.status = ProgressStatus::Error;
    }
}

fn update_action(existing: &mut ActionItem, incoming: ActionItem) {
    existing.status = incoming.status;
    existing.text = incoming.text;
    if incoming.icon.is_some() {
        existing.icon = incoming.icon;
    }
    if incoming.detail.is_some() {
        existing.detail = incoming.detail;
    }
    if incoming.file_path.is_some() {
        existing.file_path = incoming.file_path;
    }
    if incoming.checkpoint_id.is_some() {
        existing.checkpoint_id = incoming.checkpoint_id;
    }
    if incoming.start_line.is_some() {
        existing.start_line = incoming.start_line;
    }
}

/// Finalize a progress group: every still-open action becomes `success`,
/// the group status follows the group-status law, and the group collapses
/// unless it belongs to a sub-agent.
pub fn finish_progress_group(group: &mut ProgressItem) {
    for action in &mut group.actions {
        if action.status.is_open() {
            action.status = ActionStatus::Success;
        }
    }
    group.status = if group.has_error_action() {
        ProgressStatus::Error
    } else {
        ProgressStatus::Done
    };
    group.collapsed = !group.is_subagent;
    group.last_action_status = group.actions.last().map(|action| action.status);
}

/// Append a terminal error action and force the group to `error`.
pub fn fail_progress_group(group: &mut ProgressItem, message: impl Into<String>) {
    let mut action = ActionItem::new(ActionStatus::Error, message);
    action.icon = Some("error".to_string());
    group.actions.push(action);
    group.status = ProgressStatus::Error;
    group.collapsed = true;
    group.last_action_status = Some(ActionStatus::Error);
}

/// Ordered pseudo-action for sub-agent reasoning, so it renders
/// interleaved with the group's tool steps.
pub fn insert_subagent_note(group: &mut ProgressItem, content: impl Into<String>) {
    let mut note = ActionItem::new(ActionStatus::Success, content);
    note.icon = Some("thinking".to_string());
    group.actions.push(note);
}

fn last_running_in(tools: &mut ToolsBlock) -> Option<&mut ProgressItem> {
    tools.items.iter_mut().rev().find_map(|item| match item {
        ToolItem::Progress(group) if group.status == ProgressStatus::Running => Some(group),
        _ => None,
    })
}

/// Fallback group resolution: the last `running` progress item anywhere in
/// the thread, including sections of thinking groups that already closed.
/// A completion can legitimately arrive after intervening text closed its
/// group.
pub fn last_running_group_mut(blocks: &mut [Block]) -> Option<&mut ProgressItem> {
    for block in blocks.iter_mut().rev() {
        match block {
            Block::Tools(tools) => {
                if let Some(group) = last_running_in(tools) {
                    return Some(group);
                }
            }
            Block::Thinking(thinking) => {
                for section in thinking.sections.iter_mut().rev() {
                    if let ThinkingSection::Tools(tools) = section {
                        if let Some(group) = last_running_in(tools) {
                            return Some(group);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate an approval card by id across the whole timeline, closed
/// thinking groups included.
pub fn find_approval_mut<'a>(
    timeline: &'a mut Timeline,
    approval_id: &str,
) -> Option<&'a mut ToolItem> {
    for item in timeline.items.iter_mut().rev() {
        let TimelineItem::Assistant(thread) = item else {
            continue;
        };
        for block in thread.blocks.iter_mut().rev() {
            match block {
                Block::Tools(tools) => {
                    if let Some(found) = approval_in(tools, approval_id) {
                        return Some(found);
                    }
                }
                Block::Thinking(thinking) => {
                    for section in thinking.sections.iter_mut().rev() {
                        if let ThinkingSection::Tools(tools) = section {
                            if let Some(found) = approval_in(tools, approval_id) {
                                return Some(found);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn approval_in<'a>(tools: &'a mut ToolsBlock, approval_id: &str) -> Option<&'a mut ToolItem> {
    tools.items.iter_mut().rev().find(|item| match item {
        ToolItem::CommandApproval(card) => card.approval_id == approval_id,
        ToolItem::FileEditApproval(card) => card.approval_id == approval_id,
        ToolItem::Progress(_) => false,
    })
}

/// Complete the action mirroring an approval card, searching every group
/// of every thread. Returns whether a matching action was found.
pub fn resolve_approval_action(timeline: &mut Timeline, approval_id: &str, approved: bool) -> bool {
    let status = if approved {
        ActionStatus::Success
    } else {
        ActionStatus::Error
    };

    for item in timeline.items.iter_mut().rev() {
        let TimelineItem::Assistant(thread) = item else {
            continue;
        };
        for block in thread.blocks.iter_mut().rev() {
            let groups: Vec<&mut ProgressItem> = match block {
                Block::Tools(tools) => progress_items(tools),
                Block::Thinking(thinking) => thinking
                    .sections
                    .iter_mut()
                    .flat_map(|section| match section {
                        ThinkingSection::Tools(tools) => progress_items(tools),
                        _ => Vec::new(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for group in groups {
                if let Some(action) = group
                    .actions
                    .iter_mut()
                    .find(|action| action.approval_id.as_deref() == Some(approval_id))
                {
                    action.status = status;
                    group.last_action_status = Some(status);
                    if status == ActionStatus::Error {
                        group.status = ProgressStatus::Error;
                    }
                    return true;
                }
            }
        }
    }
    false
}

fn progress_items(tools: &mut ToolsBlock) -> Vec<&mut ProgressItem> {
    tools
        .items
        .iter_mut()
        .filter_map(|item| match item {
            ToolItem::Progress(group) => Some(group),
            _ => None,
        })
        .collect()
}

/// Record an approval outcome on a card.
pub fn resolve_card(card: &mut ToolItem, approved: bool) {
    let resolution = if approved {
        ApprovalResolution::Approved
    } else {
        ApprovalResolution::Denied
    };
    match card {
        ToolItem::CommandApproval(card) => card.resolution = Some(resolution),
        ToolItem::FileEditApproval(card) => card.resolution = Some(resolution),
        ToolItem::Progress(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{
        CommandApprovalItem, Thread, ThinkingContent, ThinkingGroup,
    };

    fn action(status: ActionStatus, text: &str) -> ActionItem {
        ActionItem::new(status, text)
    }

    #[test]
    fn same_text_open_action_merges_in_place() {
        let mut group = ProgressItem::running("Reading", false);
        merge_tool_action(&mut group, action(ActionStatus::Running, "Read x.ts"));
        merge_tool_action(&mut group, action(ActionStatus::Success, "Read x.ts"));

        assert_eq!(group.actions.len(), 1);
        assert_eq!(group.actions[0].status, ActionStatus::Success);
        assert_eq!(group.last_action_status, Some(ActionStatus::Success));
    }

    #[test]
    fn differently_worded_completion_resolves_latest_open_action() {
        let mut group = ProgressItem::running("Editing", false);
        merge_tool_action(&mut group, action(ActionStatus::Running, "Editing x.ts"));
        merge_tool_action(&mut group, action(ActionStatus::Success, "Edited x.ts"));

        assert_eq!(group.actions.len(), 1);
        assert_eq!(group.actions[0].text, "Edited x.ts");
        assert_eq!(group.actions[0].status, ActionStatus::Success);
    }

    #[test]
    fn non_terminal_action_with_new_text_appends() {
        let mut group = ProgressItem::running("Working", false);
        merge_tool_action(&mut group, action(ActionStatus::Running, "step one"));
        merge_tool_action(&mut group, action(ActionStatus::Running, "step two"));
        assert_eq!(group.actions.len(), 2);
    }

    #[test]
    fn error_action_forces_group_error() {
        let mut group = ProgressItem::running("Running tests", false);
        merge_tool_action(&mut group, action(ActionStatus::Error, "cargo test failed"));
        assert_eq!(group.status, ProgressStatus::Error);
    }

    #[test]
    fn terminal_fallback_skips_approval_mirror_actions() {
        let mut group = ProgressItem::running("Shell", false);
        let mut mirror = action(ActionStatus::Pending, "rm -rf target");
        mirror.approval_id = Some("ap-1".to_string());
        group.actions.push(mirror);

        merge_tool_action(&mut group, action(ActionStatus::Success, "Cleaned target"));

        assert_eq!(group.actions.len(), 2);
        assert_eq!(group.actions[0].status, ActionStatus::Pending);
        assert_eq!(group.actions[1].status, ActionStatus::Success);
    }

    #[test]
    fn finish_forces_open_actions_to_success() {
        let mut group = ProgressItem::running("Reading", false);
        merge_tool_action(&mut group, action(ActionStatus::Running, "Read a"));
        merge_tool_action(&mut group, action(ActionStatus::Pending, "Read b"));
        finish_progress_group(&mut group);

        assert!(group.actions.iter().all(|a| a.status.is_terminal()));
        assert_eq!(group.status, ProgressStatus::Done);
        assert!(group.collapsed);
    }

    #[test]
    fn finish_preserves_error_actions_and_status() {
        let mut group = ProgressItem::running("Build", false);
        merge_tool_action(&mut group, action(ActionStatus::Error, "compile error"));
        merge_tool_action(&mut group, action(ActionStatus::Running, "retrying"));
        finish_progress_group(&mut group);

        assert_eq!(group.actions[0].status, ActionStatus::Error);
        assert_eq!(group.actions[1].status, ActionStatus::Success);
        assert_eq!(group.status, ProgressStatus::Error);
    }

    #[test]
    fn finish_keeps_subagent_groups_expanded() {
        let mut group = ProgressItem::running("Explore", true);
        finish_progress_group(&mut group);
        assert!(!group.collapsed);
        assert_eq!(group.status, ProgressStatus::Done);
    }

    #[test]
    fn fail_appends_terminal_error_action() {
        let mut group = ProgressItem::running("Deploy", false);
        fail_progress_group(&mut group, "connection refused");
        assert_eq!(group.status, ProgressStatus::Error);
        assert!(group.collapsed);
        assert_eq!(group.actions.last().unwrap().status, ActionStatus::Error);
    }

    #[test]
    fn last_running_group_found_inside_closed_thinking_group() {
        let mut thinking = ThinkingGroup::open();
        thinking
            .trailing_tools_mut()
            .push_progress(ProgressItem::running("Reading", false));
        thinking.close();

        let mut blocks = vec![
            Block::Thinking(thinking),
            Block::Text(crate::timeline::TextBlock::streaming("answer")),
        ];

        let group = last_running_group_mut(&mut blocks).expect("running group");
        assert_eq!(group.title, "Reading");
    }

    #[test]
    fn last_running_group_prefers_most_recent() {
        let mut tools = ToolsBlock::default();
        let mut done = ProgressItem::running("First", false);
        finish_progress_group(&mut done);
        tools.items.push(ToolItem::Progress(done));
        tools.push_progress(ProgressItem::running("Second", false));

        let mut blocks = vec![Block::Tools(tools)];
        let group = last_running_group_mut(&mut blocks).expect("running group");
        assert_eq!(group.title, "Second");
    }

    #[test]
    fn approval_lookup_spans_closed_groups() {
        let mut thinking = ThinkingGroup::open();
        thinking.sections.push(ThinkingSection::Thinking(ThinkingContent {
            content: "deciding".to_string(),
            duration_ms: Some(3),
            sealed: true,
        }));
        thinking
            .trailing_tools_mut()
            .items
            .push(ToolItem::CommandApproval(CommandApprovalItem {
                approval_id: "ap-9".to_string(),
                command: "cargo publish".to_string(),
                explanation: None,
                resolution: None,
            }));
        thinking.close();

        let mut thread = Thread::new(None);
        thread.blocks.push(Block::Thinking(thinking));
        let mut timeline = Timeline::new();
        timeline.items.push(TimelineItem::Assistant(thread));

        let card = find_approval_mut(&mut timeline, "ap-9").expect("card");
        resolve_card(card, true);
        match card {
            ToolItem::CommandApproval(card) => {
                assert_eq!(card.resolution, Some(ApprovalResolution::Approved));
            }
            other => panic!("expected command approval, got {other:?}"),
        }
    }

    #[test]
    fn approval_action_resolution_marks_group() {
        let mut group = ProgressItem::running("Shell", false);
        let mut mirror = ActionItem::new(ActionStatus::Pending, "rm -rf target");
        mirror.approval_id = Some("ap-2".to_string());
        group.actions.push(mirror);

        let mut thread = Thread::new(None);
        let mut tools = ToolsBlock::default();
        tools.items.push(ToolItem::Progress(group));
        thread.blocks.push(Block::Tools(tools));
        let mut timeline = Timeline::new();
        timeline.items.push(TimelineItem::Assistant(thread));

        assert!(resolve_approval_action(&mut timeline, "ap-2", false));
        let group = timeline
            .thread_mut(0)
            .unwrap()
            .blocks[0]
            .as_tools_mut()
            .unwrap()
            .progress_mut(0)
            .unwrap();
        assert_eq!(group.actions[0].status, ActionStatus::Error);
        assert_eq!(group.status, ProgressStatus::Error);
    }

    #[test]
    fn subagent_note_is_ordered_with_actions() {
        let mut group = ProgressItem::running("Explore", true);
        merge_tool_action(&mut group, action(ActionStatus::Success, "Read a.rs"));
        insert_subagent_note(&mut group, "the parser lives in core");
        merge_tool_action(&mut group, action(ActionStatus::Success, "Read b.rs"));

        assert_eq!(group.actions.len(), 3);
        assert_eq!(group.actions[1].icon.as_deref(), Some("thinking"));
    }
}
