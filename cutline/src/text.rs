//! Text normalization for heading matching.
//!
//! OCR output for Vietnamese textbook headings is noisy: diacritics get
//! dropped or misread, words split mid-syllable, and the heading numeral
//! often lands in its own detection. Matching therefore runs on a reduced
//! signature, the diacritic-stripped uppercase initial of each word,
//! rather than on full strings.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static HEADING_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

// Digit runs or letter runs; the letter class spans the precomposed
// Vietnamese range plus the stroked D, matching how scanned text reads.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+|[A-Za-zÀ-Ỵà-ỵĐđ]+").expect("valid regex"));

/// First integer found in a raw heading string such as `"2."` or `"Bài 2"`.
#[must_use]
pub fn extract_heading_num(heading: &str) -> Option<u32> {
    HEADING_NUM_RE
        .find(heading)
        .and_then(|m| m.as_str().parse().ok())
}

/// Splits text into digit runs and letter runs, dropping punctuation.
#[must_use]
pub fn tokenize_words(text: &str) -> Vec<&str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Strips the accent from an upper-case letter, keeping only characters
/// that are upper-case letters both before and after decomposition.
///
/// Lower-case input is deliberately rejected: OCR reads capital initials
/// far more reliably than the lower-case body of a word, so only capitals
/// contribute to a heading signature. `Đ` has no canonical decomposition
/// and is mapped by hand.
#[must_use]
pub fn base_upper_letter(ch: char) -> Option<char> {
    if ch == 'Đ' {
        return Some('D');
    }
    if ch == 'đ' {
        return None;
    }
    if !ch.is_alphabetic() || !ch.is_uppercase() {
        return None;
    }
    let mut decomposed = std::iter::once(ch).nfd().filter(|c| !is_combining_mark(*c));
    let base = decomposed.next()?;
    if decomposed.next().is_some() {
        return None;
    }
    (base.is_alphabetic() && base.is_uppercase()).then_some(base)
}

/// Expected heading signature: the stripped initial of each word of the
/// title, in order. Words whose first letter is not an upper-case letter
/// contribute nothing.
#[must_use]
pub fn build_expected_letters(title: &str) -> Vec<char> {
    title
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphabetic()))
        .filter_map(base_upper_letter)
        .collect()
}

/// Observed signature of a stretch of OCR text: stripped initials of its
/// letter tokens, digit tokens skipped.
#[must_use]
pub fn extract_initials(text: &str) -> Vec<char> {
    tokenize_words(text)
        .into_iter()
        .filter(|tok| !tok.starts_with(|c: char| c.is_ascii_digit()))
        .filter_map(|tok| tok.chars().next())
        .filter_map(base_upper_letter)
        .collect()
}

/// Compiled recognizers for one heading number.
///
/// Built once per chunk; all matching against page text goes through
/// these four shapes.
#[derive(Debug)]
pub struct HeadingPatterns {
    num: u32,
    pure: Regex,
    list_marker: Regex,
    immediate_dot: Regex,
    prefix: Regex,
}

impl HeadingPatterns {
    /// Compiles the recognizers for `num`.
    #[must_use]
    pub fn new(num: u32) -> Self {
        Self {
            num,
            pure: Regex::new(&format!(r"^\s*{num}\s*\.?\s*$")).expect("valid regex"),
            list_marker: Regex::new(&format!(r"^\s*{num}\s*\)")).expect("valid regex"),
            immediate_dot: Regex::new(&format!(r"^\s*{num}\.")).expect("valid regex"),
            prefix: Regex::new(&format!(r"^\s*{num}\s*\.?\s*(\S.+)$")).expect("valid regex"),
        }
    }

    /// Heading number these patterns recognize.
    #[must_use]
    pub const fn num(&self) -> u32 {
        self.num
    }

    /// Whether `text` is nothing but the heading numeral, with or without
    /// a trailing dot. `"2)"` is a list item, not a heading.
    #[must_use]
    pub fn is_pure_token(&self, text: &str) -> bool {
        let t = text.trim();
        !self.list_marker.is_match(t) && self.pure.is_match(t)
    }

    /// Whether the numeral is immediately followed by a literal dot.
    /// `"2."` qualifies; `"2 ."` does not.
    #[must_use]
    pub fn has_immediate_dot(&self, text: &str) -> bool {
        self.immediate_dot.is_match(text.trim())
    }

    /// Strips a leading `"{num}."` or `"{num} "` from a line, returning
    /// the remainder when it looks like a title (non-empty, not starting
    /// with another digit).
    #[must_use]
    pub fn split_prefix(&self, text: &str) -> Option<String> {
        let t = text.trim();
        if self.list_marker.is_match(t) {
            return None;
        }
        let rest = self.prefix.captures(t)?.get(1)?.as_str().trim().to_string();
        if rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        Some(rest)
    }
}
