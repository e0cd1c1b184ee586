use crate::{Record, Stat};

/// Base trait for line-oriented stat extractors.
///
/// Object-safe so a `StatParser` can own any format behind `Box<dyn LineParser>`.
pub trait LineParser {
    /// Returns the name of this parser (e.g., "bench").
    fn name(&self) -> &'static str;

    /// Extracts zero or more stats from one line of log output.
    ///
    /// Must never fail: unrecognized lines yield an empty vec, malformed
    /// numeric tokens yield NaN values.
    fn parse_line(&self, line: &str, state: &mut ParseState) -> Vec<Stat>;

    /// Post-processes the accumulated record once a section's lines are
    /// exhausted (derived summary keys, defaults for empty input).
    fn finalize(&self, record: &mut Record, state: &mut ParseState) {
        let _ = (record, state);
    }
}

/// Whether the parser is inside a multi-line structured table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableState {
    #[default]
    Scanning,
    InTable,
}

/// Mutable context threaded through `parse_line` across one section.
///
/// Created per section and reset at section boundaries.
#[derive(Debug, Clone, Default)]
pub struct ParseState {
    pub table: TableState,
}

impl ParseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.table = TableState::Scanning;
    }

    pub fn in_table(&self) -> bool {
        self.table == TableState::InTable
    }

    pub fn enter_table(&mut self) {
        self.table = TableState::InTable;
    }

    pub fn leave_table(&mut self) {
        self.table = TableState::Scanning;
    }
}
