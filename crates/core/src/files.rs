//! Cross-checkpoint aggregation of pending file edits.
//!
//! At most one `FilesChanged` block exists per timeline. Files merge in by
//! path, resolve individually or per checkpoint, and the block disappears
//! once nothing is left pending.

use crate::event::{FileChangePayload, FileDiffStat};
use crate::timeline::{
    Block, FileChangeFileItem, FileChangeStatus, FilesChangedBlock, Timeline, TimelineItem,
};

/// Outcome of merging one checkpoint into the singleton: the paths that
/// need fresh diff statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilesMergeReport {
    /// Paths seen for the first time.
    pub added: Vec<String>,
    /// Paths that were already resolved once and got edited again; their
    /// previous stats are stale.
    pub re_edited: Vec<String>,
}

impl FilesMergeReport {
    pub fn stale_paths(&self) -> Vec<String> {
        let mut paths = self.added.clone();
        paths.extend(self.re_edited.iter().cloned());
        paths
    }
}

/// Locate the singleton anywhere in the timeline.
pub fn find_files_block_mut(timeline: &mut Timeline) -> Option<&mut FilesChangedBlock> {
    for item in timeline.items.iter_mut().rev() {
        let TimelineItem::Assistant(thread) = item else {
            continue;
        };
        for block in thread.blocks.iter_mut().rev() {
            if let Block::FilesChanged(files) = block {
                return Some(files);
            }
        }
    }
    None
}

/// Merge one checkpoint's files into the block. Files merge by path: an
/// existing entry is updated in place, never duplicated.
pub fn merge_checkpoint(
    block: &mut FilesChangedBlock,
    checkpoint_id: &str,
    files: &[FileChangePayload],
) -> FilesMergeReport {
    block.checkpoint_ids.insert(checkpoint_id.to_string());

    let mut report = FilesMergeReport::default();
    for incoming in files {
        match block
            .files
            .iter_mut()
            .find(|file| file.path == incoming.path)
        {
            Some(existing) => {
                let was_resolved = existing.status != FileChangeStatus::Pending;
                existing.action = incoming.action;
                existing.checkpoint_id = checkpoint_id.to_string();
                if was_resolved {
                    // Re-edit: stats from the earlier round are stale.
                    existing.status = FileChangeStatus::Pending;
                    existing.additions = None;
                    existing.deletions = None;
                    report.re_edited.push(existing.path.clone());
                }
            }
            None => {
                block.files.push(FileChangeFileItem {
                    path: incoming.path.clone(),
                    action: incoming.action,
                    additions: None,
                    deletions: None,
                    status: FileChangeStatus::Pending,
                    checkpoint_id: checkpoint_id.to_string(),
                });
                report.added.push(incoming.path.clone());
            }
        }
    }

    block.loading = !report.added.is_empty() || !report.re_edited.is_empty();
    recompute_totals(block);
    report
}

/// Fill additions/deletions for pending files. Resolved files keep their
/// terminal values.
pub fn apply_diff_stats(block: &mut FilesChangedBlock, stats: &[FileDiffStat]) {
    for stat in stats {
        if let Some(file) = block
            .files
            .iter_mut()
            .find(|file| file.path == stat.path && file.status == FileChangeStatus::Pending)
        {
            file.additions = Some(stat.additions);
            file.deletions = Some(stat.deletions);
        }
    }
    block.loading = false;
    recompute_totals(block);
}

/// Remove one file after the user kept or undid it. Returns whether a
/// matching file existed.
pub fn resolve_file(block: &mut FilesChangedBlock, path: &str) -> bool {
    let before = block.files.len();
    block.files.retain(|file| file.path != path);
    recompute_totals(block);
    before != block.files.len()
}

/// Remove every file of a checkpoint in bulk.
pub fn resolve_checkpoint(block: &mut FilesChangedBlock, checkpoint_id: &str) {
    block.files.retain(|file| file.checkpoint_id != checkpoint_id);
    block.checkpoint_ids.remove(checkpoint_id);
    recompute_totals(block);
}

fn recompute_totals(block: &mut FilesChangedBlock) {
    block.total_additions = block
        .files
        .iter()
        .filter_map(|file| file.additions)
        .sum();
    block.total_deletions = block
        .files
        .iter()
        .filter_map(|file| file.deletions)
        .sum();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::FileChangeAction;

    fn payload(path: &str, action: FileChangeAction) -> FileChangePayload {
        FileChangePayload {
            path: path.to_string(),
            action,
            implicit_context: false,
        }
    }

    #[test]
    fn merge_reports_new_paths_once() {
        let mut block = FilesChangedBlock::empty();
        let report = merge_checkpoint(
            &mut block,
            "cp-1",
            &[
                payload("src/a.rs", FileChangeAction::Modified),
                payload("src/b.rs", FileChangeAction::Created),
            ],
        );
        assert_eq!(report.added, vec!["src/a.rs", "src/b.rs"]);
        assert!(report.re_edited.is_empty());
        assert!(block.loading);

        let report = merge_checkpoint(
            &mut block,
            "cp-2",
            &[payload("src/a.rs", FileChangeAction::Modified)],
        );
        assert!(report.added.is_empty());
        assert_eq!(block.files.len(), 2);
        assert_eq!(
            block.checkpoint_ids.iter().cloned().collect::<Vec<_>>(),
            vec!["cp-1", "cp-2"]
        );
    }

    #[test]
    fn reappearing_resolved_file_is_re_edited() {
        let mut block = FilesChangedBlock::empty();
        merge_checkpoint(&mut block, "cp-1", &[payload("src/a.rs", FileChangeAction::Modified)]);
        apply_diff_stats(
            &mut block,
            &[FileDiffStat {
                path: "src/a.rs".to_string(),
                additions: 4,
                deletions: 1,
            }],
        );
        block.files[0].status = FileChangeStatus::Kept;

        let report = merge_checkpoint(
            &mut block,
            "cp-2",
            &[payload("src/a.rs", FileChangeAction::Modified)],
        );
        assert_eq!(report.re_edited, vec!["src/a.rs"]);
        assert_eq!(block.files[0].status, FileChangeStatus::Pending);
        assert_eq!(block.files[0].additions, None);
        assert_eq!(block.files[0].checkpoint_id, "cp-2");
    }

    #[test]
    fn diff_stats_only_touch_pending_files() {
        let mut block = FilesChangedBlock::empty();
        merge_checkpoint(
            &mut block,
            "cp-1",
            &[
                payload("a.rs", FileChangeAction::Modified),
                payload("b.rs", FileChangeAction::Modified),
            ],
        );
        block.files[1].status = FileChangeStatus::Kept;
        block.files[1].additions = Some(9);
        block.files[1].deletions = Some(9);

        apply_diff_stats(
            &mut block,
            &[
                FileDiffStat {
                    path: "a.rs".to_string(),
                    additions: 2,
                    deletions: 3,
                },
                FileDiffStat {
                    path: "b.rs".to_string(),
                    additions: 100,
                    deletions: 100,
                },
            ],
        );

        assert_eq!(block.files[0].additions, Some(2));
        assert_eq!(block.files[1].additions, Some(9));
        assert_eq!(block.total_additions, 11);
        assert_eq!(block.total_deletions, 12);
        assert!(!block.loading);
    }

    #[test]
    fn resolve_file_removes_single_entry() {
        let mut block = FilesChangedBlock::empty();
        merge_checkpoint(
            &mut block,
            "cp-1",
            &[
                payload("a.rs", FileChangeAction::Modified),
                payload("b.rs", FileChangeAction::Deleted),
            ],
        );
        assert!(resolve_file(&mut block, "a.rs"));
        assert_eq!(block.files.len(), 1);
        assert!(!resolve_file(&mut block, "missing.rs"));
    }

    #[test]
    fn resolve_checkpoint_removes_bulk() {
        let mut block = FilesChangedBlock::empty();
        merge_checkpoint(&mut block, "cp-1", &[payload("a.rs", FileChangeAction::Modified)]);
        merge_checkpoint(&mut block, "cp-2", &[payload("b.rs", FileChangeAction::Modified)]);

        resolve_checkpoint(&mut block, "cp-1");
        assert_eq!(block.files.len(), 1);
        assert_eq!(block.files[0].path, "b.rs");
        assert!(!block.checkpoint_ids.contains("cp-1"));
        assert!(!block.is_empty());

        resolve_checkpoint(&mut block, "cp-2");
        assert!(block.is_empty());
    }
}
