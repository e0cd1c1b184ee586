use crate::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use tracing::debug;

/// Reorders a dimension's label list; must return a permutation of its input.
pub type SortRule = Box<dyn Fn(Vec<String>) -> Vec<String>>;

/// One labeled axis: a name plus an append-only label arena mapping labels
/// to dense integer ids in first-seen order.
struct Dimension {
    name: String,
    labels: Vec<String>,
    index: HashMap<String, u32>,
}

impl Dimension {
    fn new(name: String) -> Self {
        Self {
            name,
            labels: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn intern(&mut self, label: &str) -> u32 {
        if let Some(&id) = self.index.get(label) {
            return id;
        }
        let id = self.labels.len() as u32;
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), id);
        id
    }

    fn id(&self, label: &str) -> Option<u32> {
        self.index.get(label).copied()
    }
}

/// Per-dimension selector for [`Dataset::slice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    /// Keep the whole dimension in its current internal order.
    All,
    /// Collapse the dimension to a single label (absent from the result shape).
    One(String),
    /// Restrict and reorder the dimension to the given labels.
    /// An empty list means the same as `All`.
    Many(Vec<String>),
}

impl Select {
    pub fn one(label: impl Into<String>) -> Self {
        Select::One(label.into())
    }

    pub fn many<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Select::Many(labels.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Select {
    fn from(label: &str) -> Self {
        Select::One(label.to_string())
    }
}

/// A dense array over the surviving dimensions of a slice, paired with the
/// ordered label list of each axis. Absent cells are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    shape: Vec<usize>,
    values: Vec<f64>,
    labels: Vec<Vec<String>>,
}

impl Slice {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Row-major cell values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Ordered labels for each surviving axis, index-aligned with `values`.
    pub fn labels(&self) -> &[Vec<String>] {
        &self.labels
    }

    pub fn axis_labels(&self, axis: usize) -> &[String] {
        &self.labels[axis]
    }

    /// Value at a full multi-index. Panics on a rank or bounds mismatch,
    /// which is a programming error on the caller's side.
    pub fn value(&self, idx: &[usize]) -> f64 {
        assert_eq!(idx.len(), self.shape.len(), "index rank mismatch");
        let mut offset = 0;
        for (i, (&pos, &len)) in idx.iter().zip(&self.shape).enumerate() {
            assert!(pos < len, "index {pos} out of bounds for axis {i}");
            offset = offset * len + pos;
        }
        self.values[offset]
    }

    pub fn map(mut self, f: impl Fn(f64) -> f64) -> Slice {
        for v in &mut self.values {
            *v = f(*v);
        }
        self
    }

    /// Combines two identically shaped slices elementwise. Axis labels are
    /// taken from `self`.
    pub fn zip_with(&self, other: &Slice, f: impl Fn(f64, f64) -> f64) -> Result<Slice, DatasetError> {
        if self.shape != other.shape {
            return Err(DatasetError::ShapeMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Slice {
            shape: self.shape.clone(),
            values,
            labels: self.labels.clone(),
        })
    }

    /// Reverses axis order (the transpose-and-reverse-names idiom used by
    /// the sensitivity figures).
    pub fn reversed_axes(&self) -> Slice {
        let shape: Vec<usize> = self.shape.iter().rev().copied().collect();
        let labels: Vec<Vec<String>> = self.labels.iter().rev().cloned().collect();
        let mut values = vec![f64::NAN; self.values.len()];
        for (offset, idx) in Odometer::new(&self.shape).enumerate() {
            let rev: Vec<usize> = idx.iter().rev().copied().collect();
            let mut out = 0;
            for (&pos, &len) in rev.iter().zip(&shape) {
                out = out * len + pos;
            }
            values[out] = self.values[offset];
        }
        Slice { shape, values, labels }
    }
}

/// Row-major multi-index iterator over a shape.
struct Odometer {
    shape: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Odometer {
    fn new(shape: &[usize]) -> Self {
        let next = if shape.iter().any(|&n| n == 0) {
            None
        } else {
            Some(vec![0; shape.len()])
        };
        Self {
            shape: shape.to_vec(),
            next,
        }
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.clone()?;
        let mut bumped = current.clone();
        let mut done = true;
        for axis in (0..self.shape.len()).rev() {
            bumped[axis] += 1;
            if bumped[axis] < self.shape[axis] {
                done = false;
                break;
            }
            bumped[axis] = 0;
        }
        self.next = if done || self.shape.is_empty() {
            None
        } else {
            Some(bumped)
        };
        Some(current)
    }
}

/// Sparse, label-indexed N-dimensional dataset.
///
/// Label vocabularies grow monotonically during ingestion (first-seen
/// order) and are only reordered, never appended, by [`Dataset::sort`].
pub struct Dataset {
    dims: Vec<Dimension>,
    cells: HashMap<Vec<u32>, f64>,
    sort_rules: HashMap<String, SortRule>,
}

impl Dataset {
    /// Creates an empty dataset with the given dimension names, in order.
    pub fn from_dim_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dims: names
                .into_iter()
                .map(|name| Dimension::new(name.into()))
                .collect(),
            cells: HashMap::new(),
            sort_rules: HashMap::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.name.as_str()).collect()
    }

    /// Current label order of one dimension.
    pub fn labels(&self, dim: &str) -> Result<&[String], DatasetError> {
        Ok(&self.dims[self.dim_position(dim)?].labels)
    }

    fn dim_position(&self, dim: &str) -> Result<usize, DatasetError> {
        self.dims
            .iter()
            .position(|d| d.name == dim)
            .ok_or_else(|| DatasetError::UnknownDimension(dim.to_string()))
    }

    fn check_rank(&self, got: usize) -> Result<(), DatasetError> {
        if got != self.dims.len() {
            return Err(DatasetError::RankMismatch {
                expected: self.dims.len(),
                got,
            });
        }
        Ok(())
    }

    /// Sets the cell at `key` to `value`, interning unseen labels.
    /// Re-insertion under the same key overwrites: last write wins.
    pub fn insert<S: AsRef<str>>(&mut self, key: &[S], value: f64) -> Result<(), DatasetError> {
        self.check_rank(key.len())?;
        let ids: Vec<u32> = key
            .iter()
            .zip(&mut self.dims)
            .map(|(label, dim)| dim.intern(label.as_ref()))
            .collect();
        if let Some(old) = self.cells.insert(ids, value) {
            let key: Vec<&str> = key.iter().map(AsRef::as_ref).collect();
            debug!(?key, old, new = value, "cell overwritten");
        }
        Ok(())
    }

    /// Value at an exact label tuple; NaN when the cell was never inserted
    /// or a label is unknown.
    pub fn get<S: AsRef<str>>(&self, key: &[S]) -> Result<f64, DatasetError> {
        self.check_rank(key.len())?;
        let ids: Option<Vec<u32>> = key
            .iter()
            .zip(&self.dims)
            .map(|(label, dim)| dim.id(label.as_ref()))
            .collect();
        Ok(ids
            .and_then(|ids| self.cells.get(&ids).copied())
            .unwrap_or(f64::NAN))
    }

    /// Registers a label-reordering rule applied by [`Dataset::sort`].
    pub fn set_sort_rule<F>(&mut self, dim: &str, rule: F) -> Result<(), DatasetError>
    where
        F: Fn(Vec<String>) -> Vec<String> + 'static,
    {
        self.dim_position(dim)?;
        self.sort_rules.insert(dim.to_string(), Box::new(rule));
        Ok(())
    }

    /// Applies all registered sort rules, physically reordering each
    /// dimension's labels and remapping cell keys. Idempotent.
    pub fn sort(&mut self) -> Result<(), DatasetError> {
        // old id -> new id, per dimension; identity where no rule applies.
        let mut remaps: Vec<Option<Vec<u32>>> = Vec::with_capacity(self.dims.len());
        for dim in &mut self.dims {
            let Some(rule) = self.sort_rules.get(&dim.name) else {
                remaps.push(None);
                continue;
            };
            let reordered = rule(dim.labels.clone());
            let remap = permutation(&dim.index, &reordered).ok_or_else(|| {
                DatasetError::BadSortRule {
                    dim: dim.name.clone(),
                }
            })?;
            dim.labels = reordered;
            dim.index = dim
                .labels
                .iter()
                .enumerate()
                .map(|(id, label)| (label.clone(), id as u32))
                .collect();
            remaps.push(Some(remap));
        }
        let cells = self
            .cells
            .drain()
            .map(|(key, value)| {
                let key = key
                    .iter()
                    .zip(&remaps)
                    .map(|(&id, remap)| match remap {
                        Some(remap) => remap[id as usize],
                        None => id,
                    })
                    .collect();
                (key, value)
            })
            .collect();
        self.cells = cells;
        Ok(())
    }

    /// Extracts a dense slice plus aligned axis labels.
    ///
    /// Selecting a label absent from a dimension's vocabulary is not an
    /// error; the corresponding cells are NaN.
    pub fn slice(&self, selectors: &[Select]) -> Result<Slice, DatasetError> {
        self.check_rank(selectors.len())?;

        // Per dimension: candidate ids in output order, and whether the
        // dimension survives into the result shape.
        let mut axes: Vec<(Vec<Option<u32>>, bool)> = Vec::with_capacity(self.dims.len());
        let mut labels = Vec::new();
        let mut shape = Vec::new();
        for (dim, sel) in self.dims.iter().zip(selectors) {
            match sel {
                Select::One(label) => axes.push((vec![dim.id(label)], false)),
                Select::Many(wanted) if !wanted.is_empty() => {
                    shape.push(wanted.len());
                    labels.push(wanted.clone());
                    axes.push((wanted.iter().map(|l| dim.id(l)).collect(), true));
                }
                Select::All | Select::Many(_) => {
                    shape.push(dim.labels.len());
                    labels.push(dim.labels.clone());
                    axes.push(((0..dim.labels.len() as u32).map(Some).collect(), true));
                }
            }
        }

        // Collapsed axes contribute exactly one candidate, so iterating the
        // full cartesian product emits values in row-major output order.
        let full_shape: Vec<usize> = axes.iter().map(|(ids, _)| ids.len()).collect();
        let mut values = Vec::with_capacity(shape.iter().product());
        for idx in Odometer::new(&full_shape) {
            let key: Option<Vec<u32>> = idx
                .iter()
                .zip(&axes)
                .map(|(&i, (ids, _))| ids[i])
                .collect();
            values.push(
                key.and_then(|key| self.cells.get(&key).copied())
                    .unwrap_or(f64::NAN),
            );
        }
        Ok(Slice {
            shape,
            values,
            labels,
        })
    }

    /// Serializes to the self-describing text form. `indent = 0` is the
    /// compact encoding; `indent > 0` pretty-prints with that many spaces
    /// per nesting level.
    pub fn dump<W: Write>(&self, writer: W, indent: usize) -> Result<(), DatasetError> {
        let repr = self.to_repr();
        if indent == 0 {
            serde_json::to_writer(writer, &repr)?;
        } else {
            let pad = vec![b' '; indent];
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&pad);
            let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
            repr.serialize(&mut ser)?;
        }
        Ok(())
    }

    /// Reconstructs a dataset from its serialized form. Structural problems
    /// (duplicate labels, bad cell arity, unknown cell labels) are hard
    /// errors naming the offender.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let repr: DatasetRepr = serde_json::from_reader(reader)?;
        let mut dataset = Dataset::from_dim_names(repr.dimensions.iter().map(|d| d.name.clone()));
        for (dim, loaded) in dataset.dims.iter_mut().zip(&repr.dimensions) {
            for label in &loaded.labels {
                if dim.id(label).is_some() {
                    return Err(DatasetError::Malformed(format!(
                        "duplicate label {label:?} in dimension {:?}",
                        dim.name
                    )));
                }
                dim.intern(label);
            }
        }
        for cell in &repr.cells {
            if cell.key.len() != dataset.rank() {
                return Err(DatasetError::Malformed(format!(
                    "cell key {:?} does not match rank {}",
                    cell.key,
                    dataset.rank()
                )));
            }
            let ids: Option<Vec<u32>> = cell
                .key
                .iter()
                .zip(&dataset.dims)
                .map(|(label, dim)| dim.id(label))
                .collect();
            let Some(ids) = ids else {
                return Err(DatasetError::Malformed(format!(
                    "cell key {:?} references an unregistered label",
                    cell.key
                )));
            };
            dataset.cells.insert(ids, cell.value.unwrap_or(f64::NAN));
        }
        Ok(dataset)
    }

    fn to_repr(&self) -> DatasetRepr {
        let mut cells: Vec<(&Vec<u32>, f64)> = self.cells.iter().map(|(k, &v)| (k, v)).collect();
        cells.sort_by(|(a, _), (b, _)| a.cmp(b));
        DatasetRepr {
            dimensions: self
                .dims
                .iter()
                .map(|dim| DimensionRepr {
                    name: dim.name.clone(),
                    labels: dim.labels.clone(),
                })
                .collect(),
            cells: cells
                .into_iter()
                .map(|(key, value)| CellRepr {
                    key: key
                        .iter()
                        .zip(&self.dims)
                        .map(|(&id, dim)| dim.labels[id as usize].clone())
                        .collect(),
                    value: if value.is_nan() { None } else { Some(value) },
                })
                .collect(),
        }
    }
}

/// Checks `reordered` is a permutation of the arena's labels and returns
/// the old-id → new-id map.
fn permutation(index: &HashMap<String, u32>, reordered: &[String]) -> Option<Vec<u32>> {
    if reordered.len() != index.len() {
        return None;
    }
    let mut remap = vec![None; index.len()];
    for (new_id, label) in reordered.iter().enumerate() {
        let old_id = *index.get(label)? as usize;
        if remap[old_id].is_some() {
            return None;
        }
        remap[old_id] = Some(new_id as u32);
    }
    remap.into_iter().collect()
}

/// On-disk form: dimension names, per-dimension label vocabularies, and the
/// sparse cell list. Explicit NaN cells serialize as `null`; never-inserted
/// cells are simply absent.
#[derive(Serialize, Deserialize)]
struct DatasetRepr {
    dimensions: Vec<DimensionRepr>,
    cells: Vec<CellRepr>,
}

#[derive(Serialize, Deserialize)]
struct DimensionRepr {
    name: String,
    labels: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CellRepr {
    key: Vec<String>,
    value: Option<f64>,
}

/// Ready-made sort rules covering the orderings the figure stages need.
pub mod sort_rules {
    use super::SortRule;
    use regex::Regex;

    /// Orders labels by their position in a canonical list; labels not in
    /// the list keep their relative order after the known ones.
    pub fn rank_by<I, S>(order: I) -> SortRule
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        Box::new(move |mut labels| {
            labels.sort_by_key(|label| {
                order
                    .iter()
                    .position(|o| o == label)
                    .unwrap_or(usize::MAX)
            });
            labels
        })
    }

    /// Orders labels by the first numeric token they contain, so that
    /// `"0.5GB" < "2GB" < "16GB"` and `"8" < "24"`.
    pub fn numeric_prefix() -> SortRule {
        let number = Regex::new(r"\d*\.?\d+").unwrap();
        Box::new(move |mut labels| {
            labels.sort_by(|a, b| {
                let key = |label: &str| {
                    number
                        .find(label)
                        .and_then(|m| m.as_str().parse::<f64>().ok())
                        .unwrap_or(0.0)
                };
                key(a).total_cmp(&key(b))
            });
            labels
        })
    }
}
