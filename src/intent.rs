//! Dispute intent detection
//!
//! A keyword heuristic, not a language model. The state machine only sees the
//! [`IntentClassifier`] trait so a better detector can be swapped in.

/// Phrases that signal the user disagrees with something in the document.
pub const DEFAULT_DISPUTE_KEYWORDS: &[&str] = &[
    "incorrect",
    "wrong",
    "error",
    "mistake",
    "not true",
    "dispute",
    "inaccurate",
    "false",
    "never",
    "not mine",
];

/// Decides whether an utterance signals a dispute
pub trait IntentClassifier: Send + Sync {
    fn is_dispute(&self, utterance: &str) -> bool;
}

/// Any plain predicate, such as [`classify`], is a classifier
impl<F> IntentClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_dispute(&self, utterance: &str) -> bool {
        self(utterance)
    }
}

/// Case-insensitive substring match against a fixed keyword set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordClassifier {
    /// Lowercased, never empty
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Parse a comma-separated keyword list, falling back to the defaults when
    /// the list holds no usable keyword.
    pub fn from_list(list: &str) -> Self {
        let classifier = Self::new(list.split(','));
        if classifier.keywords.is_empty() {
            Self::default()
        } else {
            classifier
        }
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DISPUTE_KEYWORDS)
    }
}

impl IntentClassifier for KeywordClassifier {
    fn is_dispute(&self, utterance: &str) -> bool {
        contains_any(utterance, self.keywords())
    }
}

/// Classify with the default keyword set.
pub fn classify(utterance: &str) -> bool {
    contains_any(utterance, DEFAULT_DISPUTE_KEYWORDS.iter().copied())
}

fn contains_any<'a>(utterance: &str, keywords: impl IntoIterator<Item = &'a str>) -> bool {
    if utterance.trim().is_empty() {
        return false;
    }
    let lowered = utterance.to_lowercase();
    keywords.into_iter().any(|k| lowered.contains(k))
}
