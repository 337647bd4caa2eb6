//! Step/execute state machine for one compiled statement.

use crate::engine::{NativeError, NativeStatement, StepOutcome};

/// Execution state of a statement between bind and reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No pending row; stepping starts or resumes execution.
    Idle,
    /// A row is available for scanning; stepping advances.
    HasRow,
    /// Execution completed. Terminal until a fresh bind or reset.
    Finished,
    /// A step failed; the handle has been reset.
    Failed,
}

#[derive(Debug)]
pub(crate) struct RowCursor {
    state: CursorState,
}

impl RowCursor {
    pub(crate) fn new() -> Self {
        Self {
            state: CursorState::Idle,
        }
    }

    pub(crate) fn state(&self) -> CursorState {
        self.state
    }

    pub(crate) fn has_row(&self) -> bool {
        self.state == CursorState::HasRow
    }

    /// Evaluate one step. Returns `true` while rows keep coming.
    ///
    /// On completion the handle is reset immediately so any implicit
    /// read/write lock is released before the caller regains control; bound
    /// values and cached metadata survive the reset. On failure the handle is
    /// reset as well and the native error is surfaced.
    pub(crate) fn step(
        &mut self,
        handle: &mut dyn NativeStatement,
    ) -> Result<bool, NativeError> {
        match handle.step() {
            Ok(StepOutcome::Row) => {
                self.state = CursorState::HasRow;
                Ok(true)
            }
            Ok(StepOutcome::Done) => {
                let _ = handle.reset();
                self.state = CursorState::Finished;
                Ok(false)
            }
            Err(err) => {
                let _ = handle.reset();
                self.state = CursorState::Failed;
                Err(err)
            }
        }
    }

    /// Back to `Idle` after an explicit reset.
    pub(crate) fn rewind(&mut self) {
        self.state = CursorState::Idle;
    }

    /// A fresh bind re-arms a finished or failed execution.
    pub(crate) fn rearm(&mut self) {
        if matches!(self.state, CursorState::Finished | CursorState::Failed) {
            self.state = CursorState::Idle;
        }
    }
}
