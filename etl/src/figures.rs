use crate::driver::{load_checkpoint, scan_into, write_checkpoint, EtlError, DEFAULT_EXCLUDES};
use crate::scenario::{self, CanonicalMap};
use parser::dataset::sort_rules;
use parser::{write_chart_data, Dataset, LabelRecognizer, Select, Slice, Vocabulary};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

pub const GENERIC_CHECKPOINT: &str = "all.dat";
pub const DRAM_CHECKPOINT: &str = "sen.dram.dat";
pub const LOG_CHECKPOINT: &str = "sen.log.dat";

/// Pattern of the DRAM/log-size suffix in sensitivity run filenames:
/// main DRAM GB, cache ratio, write-log ratio, underscores as decimal points.
const SIZE_SUFFIX_PATTERN: &str = r"main([\d_]+)g-([\d_]+)-w([\d_]+)";

/// Everything a figure stage needs to know about its surroundings.
pub struct StageContext<'a> {
    /// Directory of raw benchmark log files.
    pub output_dir: &'a Path,
    /// Figure folder receiving the chart-data files.
    pub target_dir: &'a Path,
    /// Where dataset checkpoints live between the parse and slice steps.
    pub checkpoint_dir: &'a Path,
    /// Indent for checkpoint serialization (0 = compact).
    pub indent: usize,
}

/// Builds the generic (settings, workloads, measurements) dataset from a
/// log directory, sorted into canonical order.
pub fn build_generic(
    output_dir: &Path,
    settings: &CanonicalMap,
    workloads: &CanonicalMap,
) -> Result<Dataset, EtlError> {
    let mut recognizer = LabelRecognizer::new();
    recognizer.register(settings.vocabulary());
    recognizer.register(workloads.vocabulary());

    let mut dataset = Dataset::from_dim_names(["settings", "workloads", "measurements"]);
    scan_into(output_dir, &mut dataset, &DEFAULT_EXCLUDES, |name| {
        let found = recognizer.recognize(name);
        if !found.is_exhausted() {
            return None;
        }
        let setting = settings.canonical(found.label(0)?)?;
        let workload = workloads.canonical(found.label(1)?)?;
        Some(vec![setting.to_string(), workload.to_string()])
    })?;

    dataset.set_sort_rule("settings", settings.sort_rule())?;
    dataset.set_sort_rule("workloads", workloads.sort_rule())?;
    dataset.sort()?;
    Ok(dataset)
}

/// Default stage: parse everything into the generic checkpoint for later
/// slicing passes.
pub fn stage_generic(ctx: &StageContext) -> Result<(), EtlError> {
    let dataset = build_generic(ctx.output_dir, &scenario::settings(), &scenario::workloads())?;
    write_checkpoint(&dataset, &ctx.checkpoint_dir.join(GENERIC_CHECKPOINT), ctx.indent)
}

/// End-to-end performance figure: average and maximum core execution time
/// per setting and workload.
pub fn stage_e2e_perf(ctx: &StageContext) -> Result<(), EtlError> {
    let dataset = build_generic(ctx.output_dir, &scenario::e2e_settings(), &scenario::workloads())?;
    let checkpoint = ctx.checkpoint_dir.join(GENERIC_CHECKPOINT);
    write_checkpoint(&dataset, &checkpoint, ctx.indent)?;

    let dataset = load_checkpoint(&checkpoint)?;
    for (measurement, file) in [("core_exe_time_avg", "avg.dat"), ("core_exe_time_max", "max.dat")] {
        let slice = dataset.slice(&[Select::All, Select::All, measurement.into()])?;
        write_dat(&slice, ctx.target_dir, file)?;
    }
    Ok(())
}

/// NAND write traffic figure: user plus internal writes.
pub fn stage_nwrites(ctx: &StageContext) -> Result<(), EtlError> {
    let dataset = build_generic(ctx.output_dir, &scenario::settings(), &scenario::workloads())?;
    let checkpoint = ctx.checkpoint_dir.join(GENERIC_CHECKPOINT);
    write_checkpoint(&dataset, &checkpoint, ctx.indent)?;

    let dataset = load_checkpoint(&checkpoint)?;
    let user = dataset.slice(&[Select::All, Select::All, "total_nand_wr_user".into()])?;
    let internal = dataset.slice(&[Select::All, Select::All, "total_nand_wr_internal".into()])?;
    let total = user.zip_with(&internal, |u, i| u + i)?;
    write_dat(&total, ctx.target_dir, "wr.dat")
}

/// DRAM-size sensitivity figure: execution time of SkyByte-WP across main
/// DRAM sizes, resolved by resuming recognition on the filename remainder.
pub fn stage_sensitivity_dram(ctx: &StageContext) -> Result<(), EtlError> {
    let settings = scenario::settings();
    let workloads = scenario::workloads();
    let mut recognizer = LabelRecognizer::new();
    recognizer.register(settings.vocabulary());
    recognizer.register(workloads.vocabulary());
    recognizer.register(Vocabulary::pattern(SIZE_SUFFIX_PATTERN)?);

    let mut dataset =
        Dataset::from_dim_names(["settings", "workloads", "dram_size", "measurements"]);
    scan_into(ctx.output_dir, &mut dataset, &DEFAULT_EXCLUDES, |name| {
        let first = recognizer.recognize_dims(name, 2);
        let full = recognizer.resume(first);
        if !full.is_exhausted() {
            return None;
        }
        let setting = settings.canonical(full.label(0)?)?;
        let workload = workloads.canonical(full.label(1)?)?;
        let sizes = captured_floats(full.groups(2)?)?;
        if sizes.len() != 3 || !approx(sizes[1], 0.25) || !approx(sizes[2], 0.25) {
            return None;
        }
        // The 16 GB runs hold the whole working set and distort the axis.
        if approx(sizes[0], 16.0) {
            return None;
        }
        Some(vec![setting.to_string(), workload.to_string(), size_label(sizes[0], "GB")])
    })?;

    dataset.set_sort_rule("settings", settings.sort_rule())?;
    dataset.set_sort_rule("workloads", workloads.sort_rule())?;
    dataset.set_sort_rule("dram_size", sort_rules::numeric_prefix())?;
    dataset.sort()?;

    let checkpoint = ctx.checkpoint_dir.join(DRAM_CHECKPOINT);
    write_checkpoint(&dataset, &checkpoint, ctx.indent)?;

    let dataset = load_checkpoint(&checkpoint)?;
    for (measurement, file) in [("core_exe_time_avg", "avg.dat"), ("core_exe_time_max", "max.dat")] {
        let slice = dataset.slice(&[
            Select::one("SkyByte-WP"),
            Select::All,
            Select::All,
            measurement.into(),
        ])?;
        write_dat(&slice.reversed_axes(), ctx.target_dir, file)?;
    }
    Ok(())
}

/// Write-log-size sensitivity figure. Filenames without a size suffix are
/// the 64 MB default configuration.
pub fn stage_sensitivity_write_log(ctx: &StageContext) -> Result<(), EtlError> {
    let settings = scenario::settings();
    let workloads = scenario::workloads();
    let mut recognizer = LabelRecognizer::new();
    recognizer.register(settings.vocabulary());
    recognizer.register(workloads.vocabulary());
    recognizer.register(Vocabulary::pattern(SIZE_SUFFIX_PATTERN)?);

    let mut dataset =
        Dataset::from_dim_names(["settings", "workloads", "log_size", "measurements"]);
    scan_into(ctx.output_dir, &mut dataset, &DEFAULT_EXCLUDES, |name| {
        let found = recognizer.recognize_dims(name, 2);
        let setting = settings.canonical(found.label(0)?)?;
        let workload = workloads.canonical(found.label(1)?)?;
        if setting != "SkyByte-WP" {
            return None;
        }
        let log_size = if found.is_exhausted() {
            "64MB".to_string()
        } else {
            let full = recognizer.resume(found);
            if !full.is_exhausted() {
                return None;
            }
            let sizes = captured_floats(full.groups(2)?)?;
            if sizes.len() != 3 || !approx(sizes[0], 2.0) || !approx(sizes[1], 0.25) {
                return None;
            }
            let mb = (sizes[0] * sizes[1] * sizes[2] * 1024.0).round() as i64;
            if mb == 0 {
                "0.5MB".to_string()
            } else {
                format!("{mb}MB")
            }
        };
        Some(vec![setting.to_string(), workload.to_string(), log_size])
    })?;

    dataset.set_sort_rule("workloads", workloads.sort_rule())?;
    dataset.set_sort_rule("log_size", sort_rules::numeric_prefix())?;
    dataset.sort()?;

    let checkpoint = ctx.checkpoint_dir.join(LOG_CHECKPOINT);
    write_checkpoint(&dataset, &checkpoint, ctx.indent)?;

    let dataset = load_checkpoint(&checkpoint)?;
    for (measurement, file) in [("core_exe_time_avg", "avg.dat"), ("core_exe_time_max", "max.dat")] {
        let slice = dataset.slice(&[
            Select::one("SkyByte-WP"),
            Select::All,
            Select::All,
            measurement.into(),
        ])?;
        write_dat(&slice.reversed_axes(), ctx.target_dir, file)?;
    }
    Ok(())
}

/// Thread-count scaling figure: the 8-thread runs come from the standard
/// per-workload filenames, higher counts from a `<n>-assd-Full-rr` token.
pub fn stage_nthreads(ctx: &StageContext) -> Result<(), EtlError> {
    let base_workloads = scenario::nthreads_base_workloads();
    let scaling_workloads = scenario::nthreads_scaling_workloads();

    let mut dataset = Dataset::from_dim_names(["settings", "workloads", "measurements"]);

    let mut recognizer = LabelRecognizer::new();
    recognizer.register(Vocabulary::exact(["assd-WP"]));
    recognizer.register(base_workloads.vocabulary());
    scan_into(ctx.output_dir, &mut dataset, &DEFAULT_EXCLUDES, |name| {
        let found = recognizer.recognize(name);
        if !found.is_exhausted() || !found.matches()[0].is_match() {
            return None;
        }
        let workload = base_workloads.canonical(found.label(1)?)?;
        Some(vec!["8".to_string(), workload.to_string()])
    })?;

    recognizer.reregister(0, Vocabulary::pattern(r"(\d+)-assd-Full-rr")?)?;
    recognizer.reregister(1, scaling_workloads.vocabulary())?;
    scan_into(ctx.output_dir, &mut dataset, &DEFAULT_EXCLUDES, |name| {
        let found = recognizer.recognize(name);
        if !found.is_exhausted() {
            return None;
        }
        let threads = found.groups(0)?.first()?.clone();
        let workload = scaling_workloads.canonical(found.label(1)?)?;
        Some(vec![threads, workload.to_string()])
    })?;

    dataset.set_sort_rule("settings", sort_rules::numeric_prefix())?;
    dataset.set_sort_rule("workloads", scaling_workloads.sort_rule())?;
    dataset.sort()?;

    for (measurement, file) in [("core_exe_time_avg", "avg.dat"), ("core_exe_time_max", "max.dat")] {
        let slice = dataset.slice(&[Select::All, Select::All, measurement.into()])?;
        write_dat(&slice, ctx.target_dir, file)?;
    }
    Ok(())
}

fn write_dat(slice: &Slice, target_dir: &Path, file: &str) -> Result<(), EtlError> {
    let path = target_dir.join(file);
    let out = File::create(&path)?;
    write_chart_data(slice, BufWriter::new(out))?;
    info!(path = %path.display(), "wrote chart data");
    Ok(())
}

fn captured_floats(groups: &[String]) -> Option<Vec<f64>> {
    groups
        .iter()
        .map(|g| g.replace('_', ".").parse().ok())
        .collect()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// `2 -> "2GB"`, `2.5 -> "2.5GB"`.
fn size_label(amount: f64, unit: &str) -> String {
    if approx(amount, amount.round()) {
        format!("{}{unit}", amount.round() as i64)
    } else {
        format!("{amount:.1}{unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn ctx<'a>(output: &'a Path, target: &'a Path) -> StageContext<'a> {
        StageContext {
            output_dir: output,
            target_dir: target,
            checkpoint_dir: target,
            indent: 0,
        }
    }

    #[test]
    fn test_e2e_perf_stage_end_to_end() {
        let output = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write_file(
            output.path(),
            "bc-8-baseType3",
            "**core 0 ran 100 cycles in 120\n",
        );
        write_file(
            output.path(),
            "bc-8-flatflash",
            "**core 0 ran 100 cycles in 80\n",
        );

        stage_e2e_perf(&ctx(output.path(), target.path())).unwrap();

        let avg = std::fs::read_to_string(target.path().join("avg.dat")).unwrap();
        assert_eq!(avg, "Base-CSSD | SkyByte-P\n\nbc\n120 80\n");
        assert!(target.path().join("max.dat").exists());
        assert!(target.path().join(GENERIC_CHECKPOINT).exists());
    }

    #[test]
    fn test_sensitivity_dram_stage() {
        let output = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write_file(
            output.path(),
            "bc-8-assd-WP-main2g-0_25-w0_25",
            "**core 0 ran 100 cycles in 50\n",
        );
        write_file(
            output.path(),
            "bc-8-assd-WP-main0_5g-0_25-w0_25",
            "**core 0 ran 100 cycles in 90\n",
        );
        // Excluded: 16 GB run and mismatched cache ratio.
        write_file(
            output.path(),
            "bc-8-assd-WP-main16g-0_25-w0_25",
            "**core 0 ran 100 cycles in 10\n",
        );
        write_file(
            output.path(),
            "bc-8-assd-WP-main2g-0_5-w0_25",
            "**core 0 ran 100 cycles in 10\n",
        );

        stage_sensitivity_dram(&ctx(output.path(), target.path())).unwrap();

        let avg = std::fs::read_to_string(target.path().join("avg.dat")).unwrap();
        // Header is the DRAM axis in numeric order; one block per workload.
        assert_eq!(avg, "0.5GB | 2GB\n\nbc\n90 50\n");
    }

    #[test]
    fn test_nthreads_stage_merges_both_passes() {
        let output = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write_file(
            output.path(),
            "bc-8-assd-WP",
            "**core 0 ran 100 cycles in 200\n",
        );
        write_file(
            output.path(),
            "bc-16-assd-Full-rr",
            "**core 0 ran 100 cycles in 120\n",
        );
        write_file(
            output.path(),
            "bc-24-assd-Full-rr",
            "**core 0 ran 100 cycles in 90\n",
        );

        stage_nthreads(&ctx(output.path(), target.path())).unwrap();

        let avg = std::fs::read_to_string(target.path().join("avg.dat")).unwrap();
        assert_eq!(avg, "8 | 16 | 24\n\nbc\n200 120 90\n");
    }
}
