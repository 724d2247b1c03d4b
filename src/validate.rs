//! Plausibility filter for decoded book text
//!
//! EPUB decoders occasionally produce garbage: front matter only, or the same
//! boilerplate repeated many times. Comparing the word count of the result with
//! the count declared by the catalog catches both.

/// Lower bound of the accepted band, as a fraction of the declared count (exclusive)
pub const MIN_WORD_RATIO: f64 = 0.5;

/// Upper bound of the accepted band, as a fraction of the declared count (exclusive)
pub const MAX_WORD_RATIO: f64 = 1.5;

/// Decision for one text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Text may be committed
    Accepted,
    /// Text is empty or whitespace only
    Empty,
    /// Word count falls outside the accepted band around the declared count
    WordCountOutOfRange {
        /// Count declared in the manifest
        expected: u64,
        /// Whitespace-delimited tokens actually found
        actual: u64,
    },
}

impl Verdict {
    /// Whether the text may be committed
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "accepted"),
            Verdict::Empty => write!(f, "empty text"),
            Verdict::WordCountOutOfRange { expected, actual } => {
                write!(f, "{actual} words, expected about {expected}")
            }
        }
    }
}

/// Decides whether decoded text is acceptable output
#[derive(Clone, Copy, Debug)]
pub struct ContentValidator {
    check_word_count: bool,
}

impl ContentValidator {
    /// Create a validator; with `check_word_count` off only emptiness is checked
    pub fn new(check_word_count: bool) -> Self {
        Self { check_word_count }
    }

    /// Judge `text` against an optional declared word count
    pub fn accept(&self, text: &str, expected_word_count: Option<u64>) -> Verdict {
        if text.trim().is_empty() {
            return Verdict::Empty;
        }

        let expected = match expected_word_count {
            Some(expected) if self.check_word_count => expected,
            _ => return Verdict::Accepted,
        };

        let actual = count_words(text) as u64;
        if within_band(expected, actual) {
            Verdict::Accepted
        } else {
            Verdict::WordCountOutOfRange { expected, actual }
        }
    }
}

/// Number of whitespace-delimited tokens in `text`
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn within_band(expected: u64, actual: u64) -> bool {
    let expected = expected as f64;
    let actual = actual as f64;
    expected * MIN_WORD_RATIO < actual && actual < expected * MAX_WORD_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn band_boundaries_are_exclusive() {
        let v = ContentValidator::new(true);

        assert_eq!(
            v.accept(&words(500), Some(1000)),
            Verdict::WordCountOutOfRange {
                expected: 1000,
                actual: 500
            }
        );
        assert_eq!(v.accept(&words(501), Some(1000)), Verdict::Accepted);
        assert_eq!(v.accept(&words(1499), Some(1000)), Verdict::Accepted);
        assert_eq!(
            v.accept(&words(1500), Some(1000)),
            Verdict::WordCountOutOfRange {
                expected: 1000,
                actual: 1500
            }
        );
    }

    #[test]
    fn no_expected_count_accepts_any_non_empty_text() {
        let v = ContentValidator::new(true);
        assert_eq!(v.accept("one", None), Verdict::Accepted);
        assert_eq!(v.accept(&words(100_000), None), Verdict::Accepted);
    }

    #[test]
    fn empty_and_whitespace_text_is_always_rejected() {
        for check in [true, false] {
            let v = ContentValidator::new(check);
            assert_eq!(v.accept("", None), Verdict::Empty);
            assert_eq!(v.accept(" \n\t \r\n", Some(10)), Verdict::Empty);
        }
    }

    #[test]
    fn disabled_count_check_skips_ratio_test() {
        let v = ContentValidator::new(false);
        assert_eq!(v.accept(&words(3), Some(1000)), Verdict::Accepted);
        assert_eq!(v.accept(&words(5000), Some(1000)), Verdict::Accepted);
    }

    #[test]
    fn words_are_split_on_any_whitespace() {
        assert_eq!(count_words("a  b\tc\n\nd\r\ne"), 5);
        assert_eq!(count_words("   "), 0);

        let v = ContentValidator::new(true);
        // 4 tokens against an anchor of 4: inside (2, 6)
        assert!(v.accept("Call me\n\nIshmael. Some", Some(4)).is_accepted());
    }

    #[test]
    fn verdict_display_mentions_counts() {
        let verdict = Verdict::WordCountOutOfRange {
            expected: 1000,
            actual: 20,
        };
        assert_eq!(verdict.to_string(), "20 words, expected about 1000");
    }
}
