//! The live reducer's scoping context.
//!
//! All cursor state lives in one value with one reset operation. Partial
//! resets are a proven source of cross-turn corruption, so there is no way
//! to clear fields piecemeal.

/// Address of a progress item within the active thread: a block index, an
/// optional thinking-group section index, and the item index inside the
/// tools container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupAddr {
    pub block: usize,
    pub section: Option<usize>,
    pub item: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducerContext {
    /// Index of the active thread in `Timeline::items`.
    pub thread: Option<usize>,
    /// Block index of the open thinking group inside the active thread.
    pub thinking: Option<usize>,
    /// Block index of the active streaming text block.
    pub text: Option<usize>,
    /// Cursor of the active progress group.
    pub progress: Option<GroupAddr>,
    /// Saved progress cursors for nested sub-agent groups (LIFO).
    pub progress_stack: Vec<GroupAddr>,
}

impl ReducerContext {
    /// Atomically clear every cursor. The only reset there is.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Keep cursors valid after a block was removed from the active
    /// thread (the files-changed singleton discarding itself).
    pub fn shift_after_block_removal(&mut self, removed: usize) {
        let fix = |index: &mut Option<usize>| {
            match *index {
                Some(value) if value == removed => *index = None,
                Some(value) if value > removed => *index = Some(value - 1),
                _ => {}
            }
        };
        fix(&mut self.thinking);
        fix(&mut self.text);

        let fix_addr = |addr: &mut GroupAddr| {
            if addr.block > removed {
                addr.block -= 1;
            }
        };
        if let Some(addr) = self.progress.as_mut() {
            fix_addr(addr);
        }
        for addr in &mut self.progress_stack {
            fix_addr(addr);
        }
    }
}
