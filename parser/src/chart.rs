use crate::dataset::Slice;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("chart data supports slices of rank 1 to 3, got rank {0}")]
    UnsupportedRank(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes a slice in the flat chart-data form consumed by the figure
/// scripts: the first line lists axis-0 labels joined by ` | `; each
/// following blank-line-separated block is an axis-1 label line plus one
/// whitespace-separated value line per remaining index. Every value line
/// has exactly as many columns as the header.
pub fn write_chart_data<W: Write>(slice: &Slice, mut writer: W) -> Result<(), ChartError> {
    if !(1..=3).contains(&slice.rank()) {
        return Err(ChartError::UnsupportedRank(slice.rank()));
    }
    writeln!(writer, "{}", slice.axis_labels(0).join(" | "))?;
    match slice.rank() {
        1 => {
            writeln!(writer)?;
            writeln!(writer, "{}", row(slice.shape()[0], |i| slice.value(&[i])))?;
        }
        2 => {
            for (j, label) in slice.axis_labels(1).iter().enumerate() {
                writeln!(writer)?;
                writeln!(writer, "{label}")?;
                writeln!(writer, "{}", row(slice.shape()[0], |i| slice.value(&[i, j])))?;
            }
        }
        _ => {
            for (j, label) in slice.axis_labels(1).iter().enumerate() {
                writeln!(writer)?;
                writeln!(writer, "{label}")?;
                for k in 0..slice.shape()[2] {
                    writeln!(writer, "{}", row(slice.shape()[0], |i| slice.value(&[i, j, k])))?;
                }
            }
        }
    }
    Ok(())
}

fn row(columns: usize, value: impl Fn(usize) -> f64) -> String {
    (0..columns)
        .map(|i| value(i).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Select};

    fn two_by_two() -> Dataset {
        let mut dataset = Dataset::from_dim_names(["settings", "workloads", "measurements"]);
        dataset.insert(&["Base", "bc", "m"], 1.0).unwrap();
        dataset.insert(&["Fast", "bc", "m"], 2.0).unwrap();
        dataset.insert(&["Base", "ycsb", "m"], 3.0).unwrap();
        dataset.insert(&["Fast", "ycsb", "m"], 4.0).unwrap();
        dataset
    }

    #[test]
    fn test_rank_two_exact_format() {
        let dataset = two_by_two();
        let slice = dataset.slice(&[Select::All, Select::All, "m".into()]).unwrap();

        let mut out = Vec::new();
        write_chart_data(&slice, &mut out).unwrap();

        let expected = "Base | Fast\n\nbc\n1 2\n\nycsb\n3 4\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_column_count_matches_header() {
        let dataset = two_by_two();
        let slice = dataset.slice(&[Select::All, Select::All, Select::All]).unwrap();

        let mut out = Vec::new();
        write_chart_data(&slice, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut sections = text.trim_end().split("\n\n");
        let header_cols = sections.next().unwrap().split('|').count();
        for block in sections {
            for line in block.lines().skip(1) {
                assert_eq!(line.split_whitespace().count(), header_cols);
            }
        }
    }

    #[test]
    fn test_absent_cells_emit_nan_tokens() {
        let mut dataset = Dataset::from_dim_names(["settings", "workloads", "measurements"]);
        dataset.insert(&["Base", "bc", "m"], 1.0).unwrap();
        dataset.insert(&["Fast", "ycsb", "m"], 4.0).unwrap();
        let slice = dataset.slice(&[Select::All, Select::All, "m".into()]).unwrap();

        let mut out = Vec::new();
        write_chart_data(&slice, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("1 NaN"));
        assert!(text.contains("NaN 4"));
    }

    #[test]
    fn test_unsupported_rank() {
        let dataset = two_by_two();
        let scalar = dataset
            .slice(&["Base".into(), "bc".into(), "m".into()])
            .unwrap();
        assert!(matches!(
            write_chart_data(&scalar, Vec::new()),
            Err(ChartError::UnsupportedRank(0))
        ));
    }
}
