use crate::base_parser::{LineParser, ParseState};
use crate::{Record, Stat};
use regex::Regex;
use tracing::debug;

/// Title line that opens the per-cache-line modification-ratio table.
const RW_TABLE_TITLE: &str = "rw modification distribution";

/// Fixed prefix of the pipe-delimited average-latency summary row.
const LATENCY_ROW_PREFIX: &str = "|        0           0 /           0 =   -nan% |";

const CACHE_LINE_BYTES: f64 = 64.0;

/// Line parser for simulator benchmark output.
///
/// Recognizes, in priority order: the stateful rw-modification table, the
/// `**`-prefixed per-core summary lines, the pipe-delimited latency row, and
/// generic `key: value` lines. Anything else contributes nothing.
pub struct BenchLogParser {
    number: Regex,
    rw_row: Regex,
}

impl BenchLogParser {
    pub fn new() -> Self {
        Self {
            number: Regex::new(r"\d*\.?\d+").unwrap(),
            rw_row: Regex::new(r"(\d+)%:\s*r\s*(-?\d*\.\d+|-?nan)%,\s*w\s*(-?\d*\.\d+|-?nan)%")
                .unwrap(),
        }
    }

    fn numbers(&self, line: &str) -> Vec<f64> {
        self.number
            .find_iter(line)
            .map(|m| m.as_str().parse().unwrap_or(f64::NAN))
            .collect()
    }

    fn rw_table_rows(&self, line: &str) -> Vec<Stat> {
        let mut stats = Vec::new();
        for caps in self.rw_row.captures_iter(line) {
            // Percent of the cache line modified, snapped to whole lines.
            let pct: f64 = caps[1].parse().unwrap_or(f64::NAN);
            let ncl = (pct * CACHE_LINE_BYTES / 100.0).round();
            let fraction = ncl / CACHE_LINE_BYTES;
            stats.push((format!("r_modified_{fraction}"), ratio(&caps[2])));
            stats.push((format!("w_modified_{fraction}"), ratio(&caps[3])));
        }
        stats
    }

    fn core_exe_time(&self, line: &str) -> Vec<Stat> {
        let numbers = self.numbers(line);
        if numbers.len() < 3 {
            debug!(line, "per-core summary line with too few numeric fields");
            return Vec::new();
        }
        vec![(format!("core_exe_time{}", numbers[0] as u64), numbers[2])]
    }

    fn latency_row(&self, line: &str) -> Vec<Stat> {
        const KEYS: [&str; 6] = [
            "avg_host_hit_latency",
            "avg_log_read_latency",
            "avg_log_write_latency",
            "avg_cache_hit_latency",
            "avg_cache_miss_latency",
            "avg_total_latency",
        ];
        let numbers = self.numbers(line);
        // The prefix itself contributes three zeros; payload starts at index 3.
        KEYS.iter()
            .enumerate()
            .map(|(i, key)| (key.to_string(), numbers.get(i + 3).copied().unwrap_or(f64::NAN)))
            .collect()
    }
}

impl Default for BenchLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for BenchLogParser {
    fn name(&self) -> &'static str {
        "bench"
    }

    fn parse_line(&self, line: &str, state: &mut ParseState) -> Vec<Stat> {
        if state.in_table() {
            let rows = self.rw_table_rows(line);
            if rows.is_empty() {
                // First non-matching row closes the table and is consumed.
                state.leave_table();
            }
            return rows;
        }
        if line.contains(RW_TABLE_TITLE) {
            state.enter_table();
            return Vec::new();
        }
        if line.starts_with("**") {
            return self.core_exe_time(line);
        }
        if line.starts_with(LATENCY_ROW_PREFIX) {
            return self.latency_row(line);
        }
        parse_key_value(line).into_iter().collect()
    }

    fn finalize(&self, record: &mut Record, _state: &mut ParseState) {
        let times: Vec<f64> = record
            .iter()
            .filter(|(k, _)| {
                k.strip_prefix("core_exe_time")
                    .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            })
            .map(|(_, v)| v)
            .collect();
        let (avg, max) = if times.is_empty() {
            (0.0, 0.0)
        } else {
            let avg = times.iter().sum::<f64>() / times.len() as f64;
            let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (avg, max)
        };
        record.insert("core_exe_time_avg", avg);
        record.insert("core_exe_time_max", max);
    }
}

fn ratio(token: &str) -> f64 {
    if token.contains("nan") {
        f64::NAN
    } else {
        token.parse::<f64>().map(|p| p / 100.0).unwrap_or(f64::NAN)
    }
}

/// Generic `key: value` splitter used as the lowest-priority line shape.
///
/// Emits a stat only when the value side parses as a float; everything else
/// (prose, multi-colon lines, non-numeric values) contributes nothing.
pub fn parse_key_value(line: &str) -> Option<Stat> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value: f64 = value.trim().parse().ok()?;
    Some((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_parser::TableState;

    fn parse(parser: &BenchLogParser, state: &mut ParseState, line: &str) -> Vec<Stat> {
        parser.parse_line(line, state)
    }

    #[test]
    fn test_key_value_fallback() {
        let parser = BenchLogParser::new();
        let mut state = ParseState::new();

        let stats = parse(&parser, &mut state, "number_of_memory_accesses: 12345");
        assert_eq!(stats, vec![("number_of_memory_accesses".to_string(), 12345.0)]);

        assert!(parse(&parser, &mut state, "simulation starting").is_empty());
        assert!(parse(&parser, &mut state, "host: node-3").is_empty());
    }

    #[test]
    fn test_core_exe_time_line() {
        let parser = BenchLogParser::new();
        let mut state = ParseState::new();

        let stats = parse(&parser, &mut state, "**core 2 ran 48000 cycles in 120.5");
        assert_eq!(stats, vec![("core_exe_time2".to_string(), 120.5)]);
    }

    #[test]
    fn test_latency_row_tolerates_nan() {
        let parser = BenchLogParser::new();
        let mut state = ParseState::new();

        let line = format!("{LATENCY_ROW_PREFIX} 101.5 | 202.0 | 303.5 | 404.0 | 505.5 | 606.0 |");
        let stats = parse(&parser, &mut state, &line);
        assert_eq!(stats.len(), 6);
        assert_eq!(stats[0], ("avg_host_hit_latency".to_string(), 101.5));
        assert_eq!(stats[5], ("avg_total_latency".to_string(), 606.0));

        // Truncated payload: missing fields come back as NaN, never an error.
        let short = format!("{LATENCY_ROW_PREFIX} 101.5 | 202.0 |");
        let stats = parse(&parser, &mut state, &short);
        assert_eq!(stats[1].1, 202.0);
        assert!(stats[2].1.is_nan());
    }

    #[test]
    fn test_rw_table_state_machine() {
        let parser = BenchLogParser::new();
        let mut state = ParseState::new();

        assert!(parse(&parser, &mut state, "ByteFS rw modification distribution").is_empty());
        assert_eq!(state.table, TableState::InTable);

        let stats = parse(&parser, &mut state, "25%:  r 10.5%,  w 3.2%");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0], ("r_modified_0.25".to_string(), 0.105));
        assert_eq!(stats[1].0, "w_modified_0.25");
        assert!((stats[1].1 - 0.032).abs() < 1e-12);

        // A nan percentage maps to NaN, and parsing continues.
        let stats = parse(&parser, &mut state, "50%:  r -nan%,  w 1.0%");
        assert!(stats[0].1.is_nan());
        assert_eq!(stats[1].1, 0.01);

        // First non-matching line closes the table and is consumed whole.
        let stats = parse(&parser, &mut state, "write_operation: 9");
        assert!(stats.is_empty());
        assert_eq!(state.table, TableState::Scanning);

        // Back to normal parsing afterwards.
        let stats = parse(&parser, &mut state, "write_operation: 9");
        assert_eq!(stats, vec![("write_operation".to_string(), 9.0)]);
    }

    #[test]
    fn test_finalize_aggregates_core_times() {
        let parser = BenchLogParser::new();
        let mut state = ParseState::new();
        let mut record: Record = vec![
            ("core_exe_time0".to_string(), 100.0),
            ("core_exe_time1".to_string(), 200.0),
            ("write_operation".to_string(), 9.0),
        ]
        .into_iter()
        .collect();

        parser.finalize(&mut record, &mut state);
        assert_eq!(record.get("core_exe_time_avg"), Some(150.0));
        assert_eq!(record.get("core_exe_time_max"), Some(200.0));
    }

    #[test]
    fn test_finalize_defaults_on_empty_input() {
        let parser = BenchLogParser::new();
        let mut state = ParseState::new();
        let mut record = Record::new();

        parser.finalize(&mut record, &mut state);
        assert_eq!(record.get("core_exe_time_avg"), Some(0.0));
        assert_eq!(record.get("core_exe_time_max"), Some(0.0));
    }
}
