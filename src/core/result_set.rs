//! Forward-only result sets

use std::fmt;

use tracing::debug;

use super::engine::RowCursor;
use super::error::{DatabaseError, Result};
use super::value::DatabaseRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Exhausted,
    /// `reported` is set once the caller has seen the closed error
    Closed { reported: bool },
}

/// Single-pass iterator over the rows of one query
///
/// With `auto_close` the cursor is released as soon as the last row has been read.
/// Otherwise the cursor stays held until [`ResultSet::close`] or drop. Iterating after an
/// explicit `close()` yields [`DatabaseError::ResultSetClosed`] once, then ends.
pub struct ResultSet {
    cursor: Option<Box<dyn RowCursor>>,
    auto_close: bool,
    state: State,
}

impl ResultSet {
    pub fn new(cursor: Box<dyn RowCursor>, auto_close: bool) -> Self {
        Self {
            cursor: Some(cursor),
            auto_close,
            state: State::Open,
        }
    }

    /// Release the cursor. Calling it again has no effect.
    pub fn close(&mut self) {
        self.release();
        if !self.is_closed() {
            self.state = State::Closed { reported: false };
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed { .. })
    }

    /// Whether the engine-side cursor is still held
    pub fn holds_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    fn release(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.release();
            debug!("result cursor released");
        }
    }

    fn finish(&mut self) {
        self.state = State::Exhausted;
        if self.auto_close {
            self.release();
        }
    }
}

impl Iterator for ResultSet {
    type Item = Result<DatabaseRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Closed { reported: false } => {
                self.state = State::Closed { reported: true };
                return Some(Err(DatabaseError::ResultSetClosed));
            }
            State::Closed { reported: true } | State::Exhausted => return None,
            State::Open => {}
        }

        let cursor = match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => {
                self.state = State::Exhausted;
                return None;
            }
        };

        match cursor.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("auto_close", &self.auto_close)
            .field("state", &self.state)
            .field("holds_cursor", &self.cursor.is_some())
            .finish()
    }
}
