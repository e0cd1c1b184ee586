/// One extracted measurement: a stat key and its scalar value.
pub type Stat = (String, f64);

/// Insertion-ordered map from stat keys to scalar values.
///
/// Key order is load-bearing: the measurements dimension of a dataset grows
/// in first-seen order, so a `HashMap` would scramble downstream label
/// ordering. Records hold tens of keys, so lookups stay linear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<Stat>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, overwriting any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<Stat> for Record {
    fn extend<T: IntoIterator<Item = Stat>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl FromIterator<Stat> for Record {
    fn from_iter<T: IntoIterator<Item = Stat>>(iter: T) -> Self {
        let mut record = Record::new();
        record.extend(iter);
        record
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural dataset failures. These are programming or input-corruption
/// errors and abort the run; per-cell anomalies never show up here.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("expected {expected} labels, got {got}")]
    RankMismatch { expected: usize, got: usize },
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
    #[error("sort rule for dimension {dim} did not return a permutation of its labels")]
    BadSortRule { dim: String },
    #[error("malformed dataset file: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
