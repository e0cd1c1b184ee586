// Parser crate for benchmark-run log directories: filename recognition,
// stat extraction, and the labeled multidimensional dataset they feed.

pub mod types;
pub mod base_parser;
pub mod dataset;
pub mod recognizer;
pub mod chart;

// Line-oriented stat extraction
pub mod bench_parser;
pub mod stat_parser;
pub mod section_parser;

// Re-export main types
pub use types::*;
pub use base_parser::{LineParser, ParseState, TableState};
pub use dataset::{Dataset, Select, Slice, SortRule};
pub use recognizer::{LabelMatch, LabelRecognizer, Recognition, RecognizerError, Vocabulary};

// Re-export parsers
pub use bench_parser::BenchLogParser;
pub use chart::{write_chart_data, ChartError};
pub use section_parser::SectionParser;
pub use stat_parser::StatParser;
