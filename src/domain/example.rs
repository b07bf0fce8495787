// ============================================================
// Layer 3 — TextExample Domain Type
// ============================================================
// A single labelled example, independent of the CSV layout it
// came from:
//   MNLI → text_a = premise,  text_b = Some(hypothesis)
//   SA   → text_a = sentence, text_b = None

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExample {
    pub text_a: String,
    pub text_b: Option<String>,
    pub label:  i64,
}

impl TextExample {
    pub fn single(text: impl Into<String>, label: i64) -> Self {
        Self { text_a: text.into(), text_b: None, label }
    }

    pub fn pair(a: impl Into<String>, b: impl Into<String>, label: i64) -> Self {
        Self { text_a: a.into(), text_b: Some(b.into()), label }
    }

    /// All raw text carried by this example, used when building a
    /// corpus-level vocabulary.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text_a.as_str()).chain(self.text_b.as_deref())
    }
}

/// Which side of the domain pair an example belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

/// Dataset split as it appears in file names (`train_source.csv`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev   => "dev",
            Split::Test  => "test",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texts_of_pair_and_single() {
        let p = TextExample::pair("a man sleeps", "a person rests", 0);
        assert_eq!(p.texts().collect::<Vec<_>>(), vec!["a man sleeps", "a person rests"]);

        let s = TextExample::single("great product", 1);
        assert_eq!(s.texts().count(), 1);
    }
}
