use regex::Regex;
use tracing::debug;

/// Characters treated as label separators inside encoded filenames.
/// A matched span is stripped together with one adjoining separator per side.
const SEPARATORS: [char; 3] = ['-', '_', '.'];

/// One dimension's label vocabulary: either a finite set of literal labels
/// or a regular expression with capture groups.
pub enum Vocabulary {
    Exact(Vec<String>),
    Pattern(Regex),
}

impl Vocabulary {
    pub fn exact<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Vocabulary::Exact(labels.into_iter().map(Into::into).collect())
    }

    pub fn pattern(re: &str) -> Result<Self, regex::Error> {
        Ok(Vocabulary::Pattern(Regex::new(re)?))
    }
}

/// Per-dimension outcome of a recognition pass.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelMatch {
    NoMatch,
    /// A literal label from an exact vocabulary.
    Label(String),
    /// A pattern match: the full matched text plus its capture groups,
    /// pre-canonicalization.
    Captured { text: String, groups: Vec<String> },
}

impl LabelMatch {
    pub fn is_match(&self) -> bool {
        !matches!(self, LabelMatch::NoMatch)
    }

    /// The matched label text, for either vocabulary kind.
    pub fn label(&self) -> Option<&str> {
        match self {
            LabelMatch::NoMatch => None,
            LabelMatch::Label(label) => Some(label),
            LabelMatch::Captured { text, .. } => Some(text),
        }
    }

    /// Capture groups of a pattern match.
    pub fn groups(&self) -> Option<&[String]> {
        match self {
            LabelMatch::Captured { groups, .. } => Some(groups),
            _ => None,
        }
    }
}

/// Result of one recognition pass, and the resumable cursor for the next.
///
/// Holding a `Recognition` is the only partial-match state there is: passing
/// it back via [`LabelRecognizer::resume`] continues matching on the
/// remainder with already-resolved dimensions carried over, and dropping it
/// returns to a clean slate.
#[derive(Debug, Clone)]
pub struct Recognition {
    remaining: String,
    matches: Vec<LabelMatch>,
}

impl Recognition {
    /// Unmatched text left after stripping every matched span.
    pub fn remaining(&self) -> &str {
        &self.remaining
    }

    /// True when no unrecognized content is left over.
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn matches(&self) -> &[LabelMatch] {
        &self.matches
    }

    pub fn label(&self, dim: usize) -> Option<&str> {
        self.matches.get(dim).and_then(LabelMatch::label)
    }

    pub fn groups(&self, dim: usize) -> Option<&[String]> {
        self.matches.get(dim).and_then(LabelMatch::groups)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("unknown dimension index: {0}")]
    UnknownDimension(usize),
}

/// Decomposes encoded filenames into per-dimension labels by matching
/// against registered vocabularies, dimension by dimension in registration
/// order. Each dimension owns an ordered list of vocabularies tried in turn.
#[derive(Default)]
pub struct LabelRecognizer {
    dims: Vec<Vec<Vocabulary>>,
}

impl LabelRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Appends a new dimension holding the given vocabulary.
    pub fn register(&mut self, vocab: Vocabulary) {
        self.dims.push(vec![vocab]);
    }

    /// Appends a vocabulary to an existing dimension's matcher list.
    pub fn register_at(&mut self, dim: usize, vocab: Vocabulary) -> Result<(), RecognizerError> {
        self.dims
            .get_mut(dim)
            .ok_or(RecognizerError::UnknownDimension(dim))?
            .push(vocab);
        Ok(())
    }

    /// Replaces the vocabulary list for an existing dimension. Used when the
    /// same recognizer is reused across passes with different label sets.
    pub fn reregister(&mut self, dim: usize, vocab: Vocabulary) -> Result<(), RecognizerError> {
        *self
            .dims
            .get_mut(dim)
            .ok_or(RecognizerError::UnknownDimension(dim))? = vec![vocab];
        Ok(())
    }

    /// Matches all registered dimensions against `text`.
    pub fn recognize(&self, text: &str) -> Recognition {
        self.recognize_dims(text, self.ndim())
    }

    /// Matches the first `ndim` registered dimensions against `text`.
    /// Dimensions beyond `ndim` are left unresolved for a later `resume`.
    pub fn recognize_dims(&self, text: &str, ndim: usize) -> Recognition {
        let fresh = Recognition {
            remaining: text.to_string(),
            matches: vec![LabelMatch::NoMatch; self.ndim()],
        };
        self.resume_dims(fresh, ndim)
    }

    /// Continues a prior pass on its remainder: already-resolved dimensions
    /// are skipped and their matches carried into the result.
    pub fn resume(&self, prior: Recognition) -> Recognition {
        self.resume_dims(prior, self.ndim())
    }

    pub fn resume_dims(&self, prior: Recognition, ndim: usize) -> Recognition {
        let mut remaining = prior.remaining;
        let mut matches = prior.matches;
        matches.resize(self.ndim(), LabelMatch::NoMatch);

        for (dim, vocabs) in self.dims.iter().enumerate().take(ndim) {
            if matches[dim].is_match() {
                continue;
            }
            if let Some((found, rest)) = match_dimension(vocabs, &remaining) {
                debug!(dim, label = found.label(), "dimension resolved");
                matches[dim] = found;
                remaining = rest;
            }
        }
        Recognition { remaining, matches }
    }
}

/// Tries a dimension's vocabularies in order; the first that matches wins.
fn match_dimension(vocabs: &[Vocabulary], text: &str) -> Option<(LabelMatch, String)> {
    for vocab in vocabs {
        match vocab {
            Vocabulary::Exact(labels) => {
                // Longest registered label found anywhere in the text wins;
                // ties go to the earliest occurrence.
                let best = labels
                    .iter()
                    .filter_map(|label| text.find(label.as_str()).map(|pos| (label, pos)))
                    .max_by(|(a, apos), (b, bpos)| a.len().cmp(&b.len()).then(bpos.cmp(apos)));
                if let Some((label, pos)) = best {
                    let rest = strip_span(text, pos, pos + label.len());
                    return Some((LabelMatch::Label(label.clone()), rest));
                }
            }
            Vocabulary::Pattern(re) => {
                if let Some(caps) = re.captures(text) {
                    let whole = caps.get(0).map(|m| (m.start(), m.end(), m.as_str()));
                    if let Some((start, end, matched)) = whole {
                        let groups = caps
                            .iter()
                            .skip(1)
                            .flatten()
                            .map(|m| m.as_str().to_string())
                            .collect();
                        let rest = strip_span(text, start, end);
                        return Some((
                            LabelMatch::Captured {
                                text: matched.to_string(),
                                groups,
                            },
                            rest,
                        ));
                    }
                }
            }
        }
    }
    None
}

/// Removes `text[start..end]` along with one adjoining separator character
/// on each side, if present.
fn strip_span(text: &str, start: usize, end: usize) -> String {
    let mut start = start;
    let mut end = end;
    if let Some(prev) = text[..start].chars().next_back() {
        if SEPARATORS.contains(&prev) {
            start -= prev.len_utf8();
        }
    }
    if let Some(next) = text[end..].chars().next() {
        if SEPARATORS.contains(&next) {
            end += next.len_utf8();
        }
    }
    format!("{}{}", &text[..start], &text[end..])
}
