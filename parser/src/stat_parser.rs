use crate::base_parser::{LineParser, ParseState};
use crate::Record;
use tracing::debug;

/// Accumulates one section's stats through a line parser.
///
/// Lines are fed one at a time; closing the section runs the line parser's
/// `finalize` pass and snapshots the result. `dataset()` exposes the
/// finalized record of the most recently completed section.
pub struct StatParser {
    line_parser: Box<dyn LineParser>,
    record: Record,
    state: ParseState,
    finished: Record,
}

impl StatParser {
    pub fn new(line_parser: impl LineParser + 'static) -> Self {
        Self {
            line_parser: Box::new(line_parser),
            record: Record::new(),
            state: ParseState::new(),
            finished: Record::new(),
        }
    }

    /// Feeds one line into the current section.
    pub fn feed(&mut self, line: &str) {
        let stats = self.line_parser.parse_line(line, &mut self.state);
        self.record.extend(stats);
    }

    /// Closes the current section: finalizes the accumulated record,
    /// snapshots it, and resets for the next section.
    pub fn end_section(&mut self) {
        let mut record = std::mem::take(&mut self.record);
        self.line_parser.finalize(&mut record, &mut self.state);
        debug!(
            parser = self.line_parser.name(),
            stats = record.len(),
            "section finalized"
        );
        self.finished = record;
        self.state.reset();
    }

    /// The post-finalization record of the section most recently parsed.
    pub fn dataset(&self) -> &Record {
        &self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench_parser::BenchLogParser;

    #[test]
    fn test_feed_and_end_section() {
        let mut parser = StatParser::new(BenchLogParser::new());
        parser.feed("core_exe_time0: 120");
        parser.feed("noise line");
        parser.feed("write_operation: 9");
        parser.end_section();

        let record = parser.dataset();
        assert_eq!(record.get("core_exe_time0"), Some(120.0));
        assert_eq!(record.get("write_operation"), Some(9.0));
        assert_eq!(record.get("core_exe_time_avg"), Some(120.0));
    }

    #[test]
    fn test_dataset_tracks_latest_section() {
        let mut parser = StatParser::new(BenchLogParser::new());
        parser.feed("core_exe_time0: 120");
        parser.end_section();
        parser.feed("core_exe_time0: 80");
        parser.end_section();

        assert_eq!(parser.dataset().get("core_exe_time0"), Some(80.0));
    }
}
