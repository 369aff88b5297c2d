//! Linear undo/redo history of immutable snapshots.
//!
//! One instance exists per room (canonical map state) and one per overlay
//! store (links, shapes). The discipline is strictly linear: any commit
//! after an undo clears the redo stack.

/// Maximum number of snapshots retained; the oldest entries are dropped
/// first. Keeps memory bounded for long-lived rooms.
pub const MAX_DEPTH: usize = 100;

/// Linear snapshot history with a redo stack.
#[derive(Debug, Clone)]
pub struct History<S: Clone> {
    stack: Vec<S>,
    redo_stack: Vec<S>,
}

impl<S: Clone> History<S> {
    /// Start a history at `initial`. The initial snapshot is the floor:
    /// `undo` never pops past it.
    pub fn new(initial: S) -> Self {
        Self {
            stack: vec![initial],
            redo_stack: Vec::new(),
        }
    }

    /// The snapshot the history currently points at.
    pub fn current(&self) -> &S {
        // Invariant: the stack is never empty.
        self.stack.last().expect("history stack is never empty")
    }

    /// Record a new snapshot. Clears the redo stack: editing after an undo
    /// invalidates the forward history.
    pub fn commit(&mut self, snapshot: S) {
        self.stack.push(snapshot);
        self.redo_stack.clear();
        if self.stack.len() > MAX_DEPTH {
            self.stack.remove(0);
        }
    }

    /// Step back one snapshot. Returns the restored snapshot, or `None`
    /// when only the initial snapshot remains.
    pub fn undo(&mut self) -> Option<&S> {
        if self.stack.len() < 2 {
            return None;
        }
        let popped = self.stack.pop()?;
        self.redo_stack.push(popped);
        self.stack.last()
    }

    /// Step forward one snapshot. Returns the restored snapshot, or `None`
    /// when the redo stack is empty.
    pub fn redo(&mut self) -> Option<&S> {
        let snapshot = self.redo_stack.pop()?;
        self.stack.push(snapshot);
        self.stack.last()
    }

    pub fn can_undo(&self) -> bool {
        self.stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_at_initial_snapshot_is_noop() {
        let mut history = History::new(0);
        assert!(history.undo().is_none());
        assert_eq!(*history.current(), 0);
    }

    #[test]
    fn redo_with_empty_stack_is_noop() {
        let mut history = History::new(0);
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_then_redo_restores_snapshot() {
        let mut history = History::new(0);
        history.commit(1);
        history.commit(2);

        assert_eq!(history.undo().copied(), Some(1));
        assert_eq!(history.undo().copied(), Some(0));
        assert_eq!(history.redo().copied(), Some(1));
        assert_eq!(history.redo().copied(), Some(2));
        assert!(history.redo().is_none());
    }

    #[test]
    fn full_undo_redo_cycle_returns_to_latest() {
        // For s0..sn: undo n times then redo n times lands back on sn.
        let mut history = History::new(0);
        for i in 1..=5 {
            history.commit(i);
        }
        for _ in 0..5 {
            assert!(history.undo().is_some());
        }
        assert_eq!(*history.current(), 0);
        for _ in 0..5 {
            assert!(history.redo().is_some());
        }
        assert_eq!(*history.current(), 5);
    }

    #[test]
    fn commit_after_undo_clears_redo_stack() {
        let mut history = History::new(0);
        history.commit(1);
        history.commit(2);
        history.undo();
        assert!(history.can_redo());

        history.commit(9);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(*history.current(), 9);
    }

    #[test]
    fn depth_is_bounded() {
        let mut history = History::new(0);
        for i in 1..=(MAX_DEPTH * 2) {
            history.commit(i);
        }
        assert_eq!(*history.current(), MAX_DEPTH * 2);
        let mut undos = 0;
        while history.undo().is_some() {
            undos += 1;
        }
        assert_eq!(undos, MAX_DEPTH - 1);
    }
}
