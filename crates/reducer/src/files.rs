//! File-change handlers: the cross-checkpoint aggregator plus the
//! outbound requests it triggers.
//!
//! The merge itself lives in [`threadline_core::files`]; this module owns
//! placement of the singleton, the request queue, and the cursor fixup
//! when the block discards itself.

use threadline_core::event::{FileChangePayload, FileDiffStat};
use threadline_core::files;
use threadline_core::timeline::{Block, FilesChangedBlock, TimelineItem};
use tracing::debug;

use crate::outbound::OutboundRequest;
use crate::reducer::TimelineReducer;

impl TimelineReducer {
    pub(crate) fn files_changed(&mut self, checkpoint_id: &str, payloads: &[FileChangePayload]) {
        self.ensure_thread();

        for payload in payloads {
            if payload.implicit_context {
                self.outbound.push(OutboundRequest::FetchFileContent {
                    path: payload.path.clone(),
                });
            }
        }

        if files::find_files_block_mut(&mut self.timeline).is_none() {
            self.thread_mut()
                .blocks
                .push(Block::FilesChanged(FilesChangedBlock::empty()));
        }
        let Some(block) = files::find_files_block_mut(&mut self.timeline) else {
            return;
        };
        let report = files::merge_checkpoint(block, checkpoint_id, payloads);

        let stale = report.stale_paths();
        if !stale.is_empty() {
            self.outbound.push(OutboundRequest::FetchDiffStats {
                checkpoint_id: checkpoint_id.to_string(),
                paths: stale,
            });
        }
    }

    pub(crate) fn files_diff_stats(&mut self, stats: &[FileDiffStat]) {
        match files::find_files_block_mut(&mut self.timeline) {
            Some(block) => files::apply_diff_stats(block, stats),
            None => debug!("diff stats with no files block"),
        }
    }

    pub(crate) fn file_change_result(&mut self, path: &str) {
        let Some(block) = files::find_files_block_mut(&mut self.timeline) else {
            debug!(path, "file change result with no files block");
            return;
        };
        if !files::resolve_file(block, path) {
            debug!(path, "file change result for unknown path");
        }
        self.drop_files_block_if_empty();
    }

    pub(crate) fn keep_undo_result(&mut self, checkpoint_id: &str) {
        let Some(block) = files::find_files_block_mut(&mut self.timeline) else {
            debug!(checkpoint_id, "keep/undo result with no files block");
            return;
        };
        files::resolve_checkpoint(block, checkpoint_id);
        self.drop_files_block_if_empty();
    }

    /// Discard the singleton once its file list is empty, keeping the
    /// cursors valid if the removal happened inside the active thread.
    fn drop_files_block_if_empty(&mut self) {
        if !files::find_files_block_mut(&mut self.timeline)
            .map(|block| block.is_empty())
            .unwrap_or(false)
        {
            return;
        }

        for (item_index, item) in self.timeline.items.iter_mut().enumerate() {
            let TimelineItem::Assistant(thread) = item else {
                continue;
            };
            let Some(block_index) = thread
                .blocks
                .iter()
                .position(|block| matches!(block, Block::FilesChanged(_)))
            else {
                continue;
            };
            thread.blocks.remove(block_index);
            if self.ctx.thread == Some(item_index) {
                self.ctx.shift_after_block_removal(block_index);
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_core::event::UiEventKind;
    use threadline_core::testing::ev_any;
    use threadline_core::timeline::FileChangeAction;

    fn changed(checkpoint: &str, paths: &[&str]) -> threadline_core::event::UiEvent {
        ev_any(UiEventKind::FilesChanged {
            checkpoint_id: checkpoint.to_string(),
            files: paths
                .iter()
                .map(|path| FileChangePayload {
                    path: path.to_string(),
                    action: FileChangeAction::Modified,
                    implicit_context: false,
                })
                .collect(),
        })
    }

    fn files_block(reducer: &TimelineReducer) -> Option<&FilesChangedBlock> {
        reducer.timeline().items.iter().find_map(|item| {
            let TimelineItem::Assistant(thread) = item else {
                return None;
            };
            thread.blocks.iter().find_map(|block| match block {
                Block::FilesChanged(files) => Some(files),
                _ => None,
            })
        })
    }

    #[test]
    fn second_checkpoint_merges_into_singleton() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&changed("cp-1", &["a.rs"]));
        reducer.apply(&changed("cp-2", &["b.rs"]));

        let block = files_block(&reducer).expect("files block");
        assert_eq!(block.files.len(), 2);
        assert_eq!(block.checkpoint_ids.len(), 2);
        let thread = reducer.timeline().thread(0).unwrap();
        assert_eq!(thread.blocks.len(), 1);
    }

    #[test]
    fn new_paths_queue_a_diff_stats_fetch() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&changed("cp-1", &["a.rs", "b.rs"]));

        let requests = reducer.drain_outbound();
        assert_eq!(
            requests,
            vec![OutboundRequest::FetchDiffStats {
                checkpoint_id: "cp-1".to_string(),
                paths: vec!["a.rs".to_string(), "b.rs".to_string()],
            }]
        );
        assert!(reducer.drain_outbound().is_empty());
    }

    #[test]
    fn implicit_context_files_queue_content_fetch() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&ev_any(UiEventKind::FilesChanged {
            checkpoint_id: "cp-1".to_string(),
            files: vec![FileChangePayload {
                path: "notes.md".to_string(),
                action: FileChangeAction::Created,
                implicit_context: true,
            }],
        }));

        let requests = reducer.drain_outbound();
        assert!(requests.contains(&OutboundRequest::FetchFileContent {
            path: "notes.md".to_string(),
        }));
    }

    #[test]
    fn diff_stats_fill_pending_files() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&changed("cp-1", &["a.rs"]));
        reducer.apply(&ev_any(UiEventKind::FilesDiffStats {
            checkpoint_id: "cp-1".to_string(),
            stats: vec![FileDiffStat {
                path: "a.rs".to_string(),
                additions: 5,
                deletions: 2,
            }],
        }));

        let block = files_block(&reducer).expect("files block");
        assert_eq!(block.files[0].additions, Some(5));
        assert_eq!(block.total_deletions, 2);
        assert!(!block.loading);
    }

    #[test]
    fn empty_block_removes_itself() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&changed("cp-1", &["a.rs"]));
        reducer.apply(&ev_any(UiEventKind::FileChangeResult {
            path: "a.rs".to_string(),
            kept: true,
        }));

        assert!(files_block(&reducer).is_none());
        let thread = reducer.timeline().thread(0).unwrap();
        assert!(thread.blocks.is_empty());
    }

    #[test]
    fn keep_undo_resolves_whole_checkpoint() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&changed("cp-1", &["a.rs", "b.rs"]));
        reducer.apply(&changed("cp-2", &["c.rs"]));
        reducer.apply(&ev_any(UiEventKind::KeepUndoResult {
            checkpoint_id: "cp-1".to_string(),
            kept: false,
        }));

        let block = files_block(&reducer).expect("files block");
        assert_eq!(block.files.len(), 1);
        assert_eq!(block.files[0].path, "c.rs");
    }

    #[test]
    fn removal_keeps_later_cursors_valid() {
        let mut reducer = TimelineReducer::new();
        reducer.apply(&changed("cp-1", &["a.rs"]));
        reducer.apply(&ev_any(UiEventKind::StreamChunk {
            content: "text after files".to_string(),
        }));
        reducer.apply(&ev_any(UiEventKind::FileChangeResult {
            path: "a.rs".to_string(),
            kept: true,
        }));
        // The text cursor shifted with the removal: more chunks keep
        // updating the same block.
        reducer.apply(&ev_any(UiEventKind::StreamChunk {
            content: "text after files, continued".to_string(),
        }));

        let thread = reducer.timeline().thread(0).unwrap();
        assert_eq!(thread.blocks.len(), 1);
        match &thread.blocks[0] {
            Block::Text(text) => assert_eq!(text.content, "text after files, continued"),
            other => panic!("expected text block, got {other:?}"),
        }
    }
}
