use crate::stat_parser::StatParser;
use crate::ParseError;
use std::io::BufRead;
use tracing::debug;

/// Predicate marking the line that separates two sections.
pub type BoundaryFn = Box<dyn Fn(&str) -> bool>;

/// Drives registered stat parsers across the lines of one file.
///
/// With no boundary predicate the whole file is one section. A boundary
/// line closes the current section on every registered parser and is itself
/// consumed; end of input closes the last section.
pub struct SectionParser {
    parsers: Vec<StatParser>,
    boundary: Option<BoundaryFn>,
}

impl SectionParser {
    pub fn new(boundary: Option<BoundaryFn>) -> Self {
        Self {
            parsers: Vec::new(),
            boundary,
        }
    }

    pub fn register(&mut self, parser: StatParser) {
        self.parsers.push(parser);
    }

    pub fn parsers(&self) -> &[StatParser] {
        &self.parsers
    }

    /// Parses the full input, section by section.
    pub fn parse<R: BufRead>(&mut self, reader: R) -> Result<(), ParseError> {
        let mut sections = 0usize;
        for line in reader.lines() {
            let line = line?;
            if self.boundary.as_ref().is_some_and(|b| b(&line)) {
                sections += 1;
                for parser in &mut self.parsers {
                    parser.end_section();
                }
                continue;
            }
            for parser in &mut self.parsers {
                parser.feed(&line);
            }
        }
        for parser in &mut self.parsers {
            parser.end_section();
        }
        debug!(sections = sections + 1, "parsed input");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench_parser::BenchLogParser;
    use std::io::Cursor;

    #[test]
    fn test_whole_file_is_one_section() {
        let mut section = SectionParser::new(None);
        section.register(StatParser::new(BenchLogParser::new()));

        let input = "core_exe_time0: 120\nwrite_operation: 9\n";
        section.parse(Cursor::new(input)).unwrap();

        let record = section.parsers()[0].dataset();
        assert_eq!(record.get("core_exe_time0"), Some(120.0));
        assert_eq!(record.get("write_operation"), Some(9.0));
    }

    #[test]
    fn test_boundary_splits_sections() {
        let mut section = SectionParser::new(Some(Box::new(|line: &str| line.starts_with("===="))));
        section.register(StatParser::new(BenchLogParser::new()));

        let input = "core_exe_time0: 120\n==== run 2 ====\ncore_exe_time0: 80\n";
        section.parse(Cursor::new(input)).unwrap();

        // Only the most recent section's record is exposed.
        let record = section.parsers()[0].dataset();
        assert_eq!(record.get("core_exe_time0"), Some(80.0));
    }

    #[test]
    fn test_empty_input_yields_valid_record() {
        let mut section = SectionParser::new(None);
        section.register(StatParser::new(BenchLogParser::new()));
        section.parse(Cursor::new("")).unwrap();

        // Finalize defaults still apply on a file with no stats at all.
        let record = section.parsers()[0].dataset();
        assert_eq!(record.get("core_exe_time_avg"), Some(0.0));
    }
}
