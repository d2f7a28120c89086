//! The parity battery: every fixture script must produce byte-identical
//! normalized trees through the live reducer and the replay builder, and
//! the trees themselves must satisfy the structural laws.

use threadline_core::event::UiEventKind;
use threadline_core::timeline::{
    ActionStatus, Block, ProgressItem, ProgressStatus, ThinkingSection, TimelineItem, ToolItem,
};
use threadline_e2e::{Script, assert_parity, fixtures};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn all_fixtures() -> Vec<(&'static str, Script)> {
    vec![
        ("interleaved_thinking", fixtures::interleaved_thinking()),
        ("nested_subagent", fixtures::nested_subagent()),
        ("denied_approval", fixtures::denied_approval()),
        ("approved_file_edit", fixtures::approved_file_edit()),
        ("files_lifecycle", fixtures::files_lifecycle()),
        ("upstream_error", fixtures::upstream_error()),
        ("multi_turn", fixtures::multi_turn()),
    ]
}

#[test]
fn every_fixture_replays_identically() {
    init_tracing();
    for (name, script) in all_fixtures() {
        eprintln!("parity: {name}");
        assert_parity(&script);
    }
}

#[test]
fn interleaved_thinking_produces_expected_shape() {
    init_tracing();
    let timeline = fixtures::interleaved_thinking().run_live();

    let TimelineItem::Assistant(thread) = &timeline.items[1] else {
        panic!("expected assistant thread");
    };
    assert_eq!(thread.blocks.len(), 2);

    let Block::Thinking(group) = &thread.blocks[0] else {
        panic!("expected thinking group first");
    };
    assert!(group.collapsed);
    assert_eq!(group.sections.len(), 3);
    let ThinkingSection::Thinking(first) = &group.sections[0] else {
        panic!("expected thinking section");
    };
    assert_eq!(first.content, "a");
    let ThinkingSection::Tools(tools) = &group.sections[1] else {
        panic!("expected tools section");
    };
    let ToolItem::Progress(progress) = &tools.items[0] else {
        panic!("expected progress item");
    };
    assert_eq!(progress.title, "Reading");
    assert_eq!(progress.status, ProgressStatus::Done);
    let ThinkingSection::Thinking(second) = &group.sections[2] else {
        panic!("expected thinking section");
    };
    assert_eq!(second.content, "b");

    let Block::Text(text) = &thread.blocks[1] else {
        panic!("expected text block last");
    };
    assert_eq!(text.content, "answer");
    assert!(text.finalized);
}

fn for_each_group(timeline: &threadline_core::timeline::Timeline, f: &mut impl FnMut(&ProgressItem)) {
    for item in &timeline.items {
        let TimelineItem::Assistant(thread) = item else {
            continue;
        };
        for block in &thread.blocks {
            let sections: Vec<&threadline_core::timeline::ToolsBlock> = match block {
                Block::Tools(tools) => vec![tools],
                Block::Thinking(group) => group
                    .sections
                    .iter()
                    .filter_map(|section| match section {
                        ThinkingSection::Tools(tools) => Some(tools),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for tools in sections {
                for item in &tools.items {
                    if let ToolItem::Progress(group) = item {
                        f(group);
                    }
                }
            }
        }
    }
}

#[test]
fn no_text_ever_nests_inside_thinking_groups() {
    init_tracing();
    for (name, script) in all_fixtures() {
        let timeline = script.run_live();
        for item in &timeline.items {
            let TimelineItem::Assistant(thread) = item else {
                continue;
            };
            for block in &thread.blocks {
                if let Block::Thinking(group) = block {
                    for section in &group.sections {
                        assert!(
                            matches!(
                                section,
                                ThinkingSection::Thinking(_) | ThinkingSection::Tools(_)
                            ),
                            "{name}: unexpected section kind"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn group_status_law_holds_for_finished_groups() {
    init_tracing();
    for (name, script) in all_fixtures() {
        let timeline = script.run_live();
        for_each_group(&timeline, &mut |group| {
            if group.status == ProgressStatus::Running {
                return;
            }
            let has_error = group
                .actions
                .iter()
                .any(|action| action.status == ActionStatus::Error);
            assert_eq!(
                group.status == ProgressStatus::Error,
                has_error,
                "{name}: group {:?} violates the status law",
                group.title
            );
        });
    }
}

#[test]
fn finish_leaves_no_open_actions() {
    init_tracing();
    for (name, script) in all_fixtures() {
        let timeline = script.run_live();
        for_each_group(&timeline, &mut |group| {
            if group.status == ProgressStatus::Running {
                return;
            }
            for action in &group.actions {
                // The one legitimate leftover: a running action recorded
                // before an upstream failure killed the group.
                if group.status == ProgressStatus::Error {
                    continue;
                }
                assert!(
                    action.status.is_terminal(),
                    "{name}: open action {:?} in finished group",
                    action.text
                );
            }
        });
    }
}

#[test]
fn balanced_nesting_restores_the_cursor() {
    init_tracing();
    // Three opens, three closes; a subsequent orphan action must land in a
    // fresh implicit group, proving the cursor unwound to top level.
    let script = Script::new()
        .event(UiEventKind::StartProgressGroup {
            title: "One".to_string(),
            is_subagent: false,
        })
        .event(UiEventKind::StartProgressGroup {
            title: "Two".to_string(),
            is_subagent: true,
        })
        .event(UiEventKind::StartProgressGroup {
            title: "Three".to_string(),
            is_subagent: true,
        })
        .event(UiEventKind::FinishProgressGroup)
        .event(UiEventKind::FinishProgressGroup)
        .event(UiEventKind::FinishProgressGroup)
        .event(UiEventKind::ShowToolAction {
            status: ActionStatus::Running,
            icon: None,
            text: "late step".to_string(),
            detail: None,
            file_path: None,
            checkpoint_id: None,
            start_line: None,
        });
    assert_parity(&script);

    let timeline = script.run_live();
    let TimelineItem::Assistant(thread) = &timeline.items[0] else {
        panic!("expected assistant thread");
    };
    let Block::Tools(tools) = &thread.blocks[0] else {
        panic!("expected tools block");
    };
    assert_eq!(tools.items.len(), 4);
    let ToolItem::Progress(last) = &tools.items[3] else {
        panic!("expected progress item");
    };
    assert_eq!(last.title, "Working on task");
    assert_eq!(last.actions[0].text, "late step");
}

#[test]
fn files_singleton_unions_checkpoints() {
    init_tracing();
    let script = fixtures::files_lifecycle();
    let timeline = script.run_live();

    // Lifecycle ends fully resolved: the block removed itself.
    for item in &timeline.items {
        let TimelineItem::Assistant(thread) = item else {
            continue;
        };
        assert!(
            !thread
                .blocks
                .iter()
                .any(|block| matches!(block, Block::FilesChanged(_))),
            "files block should have discarded itself"
        );
    }

    // Mid-lifecycle there is exactly one block with the union of ids.
    let mut partial = fixtures::files_lifecycle();
    partial.steps.truncate(4); // user + filesChanged + stats + filesChanged
    let timeline = partial.run_live();
    let blocks: Vec<_> = timeline
        .items
        .iter()
        .filter_map(|item| match item {
            TimelineItem::Assistant(thread) => Some(thread),
            _ => None,
        })
        .flat_map(|thread| thread.blocks.iter())
        .filter_map(|block| match block {
            Block::FilesChanged(files) => Some(files),
            _ => None,
        })
        .collect();
    assert_eq!(blocks.len(), 1);
    let block = blocks[0];
    assert_eq!(block.checkpoint_ids.len(), 2);
    assert_eq!(block.files.len(), 2, "no duplicate paths");
    assert_parity(&partial);
}

#[test]
fn replay_survives_a_corrupt_record_mid_log() {
    init_tracing();
    let script = fixtures::interleaved_thinking();
    let mut records = script.to_records();
    records.insert(
        3,
        threadline_core::log::LogRecord {
            id: "broken".to_string(),
            role: threadline_core::log::Role::Tool,
            content: None,
            model: None,
            tool_name: Some(threadline_core::log::UI_TOOL_NAME.to_string()),
            tool_output: Some("%%% not json".to_string()),
        },
    );

    let replayed = threadline_replay::replay(&records);
    let live = script.run_live();
    assert_eq!(
        threadline_core::testing::normalize(&live),
        threadline_core::testing::normalize(&replayed),
    );
}

#[test]
fn unknown_event_kinds_are_structurally_inert() {
    init_tracing();
    let script = fixtures::nested_subagent();
    let mut records = script.to_records();
    records.push(threadline_core::log::LogRecord {
        id: "future".to_string(),
        role: threadline_core::log::Role::Tool,
        content: None,
        model: None,
        tool_name: Some(threadline_core::log::UI_TOOL_NAME.to_string()),
        tool_output: Some(r#"{"eventType":"holographicRender","payload":{"x":1}}"#.to_string()),
    });

    let replayed = threadline_replay::replay(&records);
    assert_eq!(
        threadline_core::testing::normalize(&script.run_live()),
        threadline_core::testing::normalize(&replayed),
    );
}
