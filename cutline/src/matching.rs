//! Locates the line that visually carries "num. TITLE" on a page.
//!
//! Five strategies interpret each line; every candidate is scored as
//! `matched * 10 + 2 (heading evidence) + 1 (dot after numeral)` and the
//! globally best score wins, ties going to the earliest strategy on the
//! earliest line. The dot bonus applies only where a literal dot
//! immediately follows the numeral: in the raw line text for
//! `prefix_line`, or in an isolated numeral detection for
//! `heading_left_title`. `same_line` evidence is a bare digit token, so
//! it never carries the bonus.

use serde::Serialize;
use tomecut_ocr::{BBox, TextDetection};

use crate::config::CutlineConfig;
use crate::lines::Line;
use crate::text::{HeadingPatterns, extract_initials, base_upper_letter, tokenize_words};

const HEADING_BONUS: i64 = 2;
const DOT_BONUS: i64 = 1;
const MERGE_LEFT_SLACK: f32 = 30.0;
const MERGE_MID_SLACK: f32 = 60.0;

/// How a candidate tied a line to the chunk heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Line text itself starts with the numeral.
    PrefixLine,
    /// Whole-line initials with no numeral anywhere; low-confidence
    /// fallback.
    TitleOnly,
    /// Isolated numeral detection sits just left of the line.
    HeadingLeftTitle,
    /// Numeral found as a digit token inside the line.
    SameLine,
    /// Numeral inside the line, title completed from lines below.
    MergeNext,
}

impl Strategy {
    /// Whether the strategy saw the heading numeral at all.
    #[must_use]
    pub const fn has_heading_evidence(self) -> bool {
        !matches!(self, Self::TitleOnly)
    }
}

/// A scored interpretation of one line as the chunk heading.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    /// Combined match score; higher wins.
    pub score: i64,
    /// Matched initials against the expected signature.
    pub matched: usize,
    /// Index of the interpreted line in the grouped line list.
    pub line_index: usize,
    /// Observed initials the score was computed from.
    pub observed: Vec<char>,
    /// Strategy that produced this candidate.
    pub strategy: Strategy,
}

/// Chunk-level flags that gate which strategies apply.
#[derive(Debug, Clone, Copy)]
pub struct MatchFlags {
    /// Chunk starts mid-way through the previous chunk's content.
    pub content_head: bool,
    /// Chunk picked up only because its heading number is forced.
    pub forced_heading: bool,
}

fn score_of(matched: usize, heading_evidence: bool, has_dot: bool) -> i64 {
    matched as i64 * 10
        + if heading_evidence { HEADING_BONUS } else { 0 }
        + if has_dot { DOT_BONUS } else { 0 }
}

/// Length of the exact common prefix.
#[must_use]
pub fn prefix_match_count(observed: &[char], expected: &[char]) -> usize {
    observed
        .iter()
        .zip(expected)
        .take_while(|(o, e)| o == e)
        .count()
}

/// Blended match metric tolerating OCR insertions and, for longer titles,
/// omissions.
///
/// Tier 1 is the plain prefix length. Tier 2: once the prefix reaches an
/// anchor (2 for signatures of up to 4 letters, else 3), extra observed
/// letters may be skipped while the expected pointer advances. Tier 3,
/// signatures of 6+ letters only: a longest-common-subsequence pass that
/// may replace the result when it reaches 80% of the expected length
/// (rounded up) and the first expected letter appears within the first
/// three observed. The subsequence pass accepts more false positives on
/// long titles in exchange for surviving simultaneous dropped and
/// inserted letters.
#[must_use]
pub fn robust_match_count(observed: &[char], expected: &[char]) -> usize {
    let p = prefix_match_count(observed, expected);

    let anchor = if expected.len() <= 4 { 2 } else { 3 };
    let skip_based = if p < anchor.min(expected.len()) {
        p
    } else {
        let mut j = p;
        for ch in &observed[p..] {
            if j < expected.len() && *ch == expected[j] {
                j += 1;
            }
        }
        j
    };

    if expected.len() >= 6 {
        let threshold = (8 * expected.len() + 9) / 10;
        let begin_ok = expected
            .first()
            .is_some_and(|e| observed.iter().take(3).any(|o| o == e));
        if begin_ok {
            let lcs = lcs_len(expected, observed);
            if lcs >= threshold {
                return lcs;
            }
        }
    }

    skip_based
}

fn lcs_len(expected: &[char], observed: &[char]) -> usize {
    let m = observed.len();
    let mut dp = vec![0usize; m + 1];
    for e in expected {
        let mut prev = 0;
        for j in 1..=m {
            let cur = dp[j];
            if *e == observed[j - 1] {
                dp[j] = prev + 1;
            } else {
                dp[j] = dp[j].max(dp[j - 1]);
            }
            prev = cur;
        }
    }
    dp[m]
}

/// An isolated numeral detection, such as a bare `"2."` left of a title.
#[derive(Debug, Clone)]
pub(crate) struct HeadingToken {
    bbox: BBox,
    has_dot: bool,
}

pub(crate) fn collect_heading_tokens(
    detections: &[TextDetection],
    patterns: &HeadingPatterns,
) -> Vec<HeadingToken> {
    detections
        .iter()
        .filter(|d| patterns.is_pure_token(&d.text))
        .map(|d| HeadingToken {
            bbox: d.bbox,
            has_dot: patterns.has_immediate_dot(&d.text),
        })
        .collect()
}

fn v_overlap_ratio(a: &BBox, b: &BBox) -> f32 {
    let inter = (a.y1.min(b.y1) - a.y0.max(b.y0)).max(0.0);
    let denom = a.height().min(b.height()).max(1.0);
    inter / denom
}

/// The numeral token best paired with `line`: left of it, within the
/// horizontal gap limit, and vertically overlapping. Smaller gap wins,
/// larger overlap breaks gap ties.
fn find_heading_left<'a>(
    tokens: &'a [HeadingToken],
    line: &Line,
    config: &CutlineConfig,
) -> Option<&'a HeadingToken> {
    let mut best: Option<((f32, f32), &HeadingToken)> = None;
    for token in tokens {
        if token.bbox.x1 > line.bbox.x0 + 20.0 {
            continue;
        }
        let gap = line.bbox.x0 - token.bbox.x1;
        if gap < 0.0 || gap > config.heading_gap_max {
            continue;
        }
        let overlap = v_overlap_ratio(&token.bbox, &line.bbox);
        if overlap < config.heading_min_overlap {
            continue;
        }
        let key = (gap, -overlap);
        let better = best.as_ref().is_none_or(|(best_key, _)| {
            key.0
                .total_cmp(&best_key.0)
                .then(key.1.total_cmp(&best_key.1))
                .is_lt()
        });
        if better {
            best = Some((key, token));
        }
    }
    best.map(|(_, token)| token)
}

struct SameLineSeq {
    observed: Vec<char>,
    heading_bbox: BBox,
}

/// Scans a line's detections for a standalone digit token equal to the
/// heading number, then accumulates initials from everything after it.
fn build_seq_from_line_items(items: &[TextDetection], patterns: &HeadingPatterns) -> Option<SameLineSeq> {
    let num_text = patterns.num().to_string();
    let mut started = false;
    let mut observed = Vec::new();
    let mut heading_bbox = BBox::new(0.0, 0.0, 0.0, 0.0);

    for item in items {
        let tokens = tokenize_words(&item.text);
        if tokens.is_empty() {
            continue;
        }
        if !started {
            if let Some(pos) = tokens
                .iter()
                .position(|t| t.starts_with(|c: char| c.is_ascii_digit()) && *t == num_text)
            {
                started = true;
                heading_bbox = item.bbox;
                for tok in &tokens[pos + 1..] {
                    if tok.starts_with(|c: char| c.is_ascii_digit()) {
                        continue;
                    }
                    if let Some(base) = tok.chars().next().and_then(base_upper_letter) {
                        observed.push(base);
                    }
                }
            }
            continue;
        }
        for tok in tokens {
            if tok.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            if let Some(base) = tok.chars().next().and_then(base_upper_letter) {
                observed.push(base);
            }
        }
    }

    started.then_some(SameLineSeq { observed, heading_bbox })
}

/// Looks below the heading token's line for a nearby, non-left-shifted
/// line whose initials extend the match.
fn try_merge_from_next_lines(
    lines: &[Line],
    index: usize,
    heading_bbox: &BBox,
    expected: &[char],
    look_ahead: usize,
) -> (usize, Vec<char>) {
    let mut best_m = 0;
    let mut best_obs = Vec::new();

    let h_mid = heading_bbox.center_y();
    let h_height = heading_bbox.height().max(1.0);

    let end = lines.len().min(index + look_ahead + 1);
    for next in &lines[index + 1..end] {
        if next.bbox.x0 < heading_bbox.x1 - MERGE_LEFT_SLACK {
            continue;
        }
        let mid = next.bbox.center_y();
        if (mid - h_mid).abs() > MERGE_MID_SLACK.max(h_height * 2.5) {
            continue;
        }
        let obs = extract_initials(&next.text);
        let m = robust_match_count(&obs, expected);
        if m > best_m {
            best_m = m;
            best_obs = obs;
        }
        if best_m >= expected.len() {
            break;
        }
    }

    (best_m, best_obs)
}

/// Evaluates every strategy on every line and returns the globally best
/// candidate, or `None` when no line yields any candidate at all.
///
/// Lines are scanned top to bottom; scanning stops early once a line's
/// best candidate matches the full expected signature.
#[must_use]
pub fn find_best_candidate(
    detections: &[TextDetection],
    lines: &[Line],
    expected: &[char],
    heading_num: u32,
    flags: MatchFlags,
    config: &CutlineConfig,
) -> Option<MatchCandidate> {
    let patterns = HeadingPatterns::new(heading_num);
    let heading_tokens = collect_heading_tokens(detections, &patterns);

    let mut best: Option<MatchCandidate> = None;

    for (index, line) in lines.iter().enumerate() {
        if line.items.is_empty() {
            continue;
        }

        let obs_title = extract_initials(&line.text);
        let matched_title = robust_match_count(&obs_title, expected);

        let mut candidates: Vec<MatchCandidate> = Vec::new();

        if let Some(rest) = patterns.split_prefix(&line.text) {
            let observed = extract_initials(&rest);
            let matched = robust_match_count(&observed, expected);
            let has_dot = patterns.has_immediate_dot(&line.text);
            candidates.push(MatchCandidate {
                score: score_of(matched, true, has_dot),
                matched,
                line_index: index,
                observed,
                strategy: Strategy::PrefixLine,
            });
        }

        if !flags.content_head && !flags.forced_heading {
            candidates.push(MatchCandidate {
                score: score_of(matched_title, false, false),
                matched: matched_title,
                line_index: index,
                observed: obs_title.clone(),
                strategy: Strategy::TitleOnly,
            });
        }

        if let Some(token) = find_heading_left(&heading_tokens, line, config) {
            candidates.push(MatchCandidate {
                score: score_of(matched_title, true, token.has_dot),
                matched: matched_title,
                line_index: index,
                observed: obs_title.clone(),
                strategy: Strategy::HeadingLeftTitle,
            });
        }

        if let Some(seq) = build_seq_from_line_items(&line.items, &patterns) {
            let matched_same = robust_match_count(&seq.observed, expected);
            candidates.push(MatchCandidate {
                score: score_of(matched_same, true, false),
                matched: matched_same,
                line_index: index,
                observed: seq.observed.clone(),
                strategy: Strategy::SameLine,
            });

            if matched_same < expected.len() {
                let (next_matched, next_obs) = try_merge_from_next_lines(
                    lines,
                    index,
                    &seq.heading_bbox,
                    expected,
                    config.look_ahead,
                );
                let combined: Vec<char> =
                    seq.observed.iter().chain(&next_obs).copied().collect();
                let combined_matched = if next_obs.is_empty() {
                    next_matched
                } else {
                    robust_match_count(&combined, expected)
                };
                let (matched, observed) = if combined_matched >= next_matched {
                    (combined_matched, combined)
                } else {
                    (next_matched, next_obs)
                };
                candidates.push(MatchCandidate {
                    score: score_of(matched, true, false),
                    matched,
                    line_index: index,
                    observed,
                    strategy: Strategy::MergeNext,
                });
            }
        }

        // Strict comparison keeps the earliest strategy on ties.
        let mut line_best: Option<MatchCandidate> = None;
        for candidate in candidates {
            if line_best.as_ref().is_none_or(|b| candidate.score > b.score) {
                line_best = Some(candidate);
            }
        }
        let Some(line_best) = line_best else {
            continue;
        };

        let full_match = line_best.matched >= expected.len();
        if best.as_ref().is_none_or(|b| line_best.score > b.score) {
            best = Some(line_best);
        }
        if full_match {
            break;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::{group_into_lines, median_height, y_tolerance};

    fn det(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> TextDetection {
        TextDetection {
            bbox: BBox::new(x0, y0, x1, y1),
            text: text.to_string(),
            confidence: 0.95,
        }
    }

    fn lines_of(dets: &[TextDetection]) -> Vec<Line> {
        group_into_lines(dets, y_tolerance(median_height(dets)))
    }

    const CONTENT_HEAD: MatchFlags = MatchFlags { content_head: true, forced_heading: false };
    const FORCED: MatchFlags = MatchFlags { content_head: false, forced_heading: true };

    #[test]
    fn numeral_inside_line_resolves_via_same_line() {
        // A stray glyph keeps the line from starting with the numeral, so
        // the digit-token path must carry the match; a bare digit token
        // earns the heading bonus but never the dot bonus.
        let dets = vec![
            det("•", 10.0, 100.0, 30.0, 130.0),
            det("2.", 40.0, 100.0, 70.0, 130.0),
            det("KHÁI NIỆM CƠ BẢN", 80.0, 100.0, 600.0, 130.0),
        ];
        let expected = crate::text::build_expected_letters("KHÁI NIỆM CƠ BẢN");
        assert_eq!(expected, vec!['K', 'N', 'C', 'B']);

        let lines = lines_of(&dets);
        let best =
            find_best_candidate(&dets, &lines, &expected, 2, CONTENT_HEAD, &CutlineConfig::default())
                .unwrap();
        assert_eq!(best.strategy, Strategy::SameLine);
        assert_eq!(best.matched, 4);
        assert_eq!(best.score, 42);
        assert_eq!(best.observed, vec!['K', 'N', 'C', 'B']);
    }

    #[test]
    fn line_starting_with_dotted_numeral_wins_as_prefix() {
        let dets = vec![det("2. KHÁI NIỆM CƠ BẢN", 40.0, 100.0, 600.0, 130.0)];
        let expected = vec!['K', 'N', 'C', 'B'];
        let lines = lines_of(&dets);
        let best =
            find_best_candidate(&dets, &lines, &expected, 2, CONTENT_HEAD, &CutlineConfig::default())
                .unwrap();
        assert_eq!(best.strategy, Strategy::PrefixLine);
        // 4 letters, heading evidence, immediate dot.
        assert_eq!(best.score, 43);
    }

    #[test]
    fn floating_dotted_numeral_pairs_with_title_line() {
        // The numeral sits on a slightly lower baseline, outside the
        // grouping tolerance but still vertically overlapping the title.
        let dets = vec![
            det("1", 120.0, 200.0, 135.0, 230.0),
            det("KHÁI NIỆM", 150.0, 200.0, 500.0, 230.0),
            det("1.", 40.0, 222.0, 65.0, 250.0),
        ];
        let expected = vec!['K', 'N'];
        let lines = lines_of(&dets);
        assert_eq!(lines.len(), 2, "numeral must not join the title row");

        let best =
            find_best_candidate(&dets, &lines, &expected, 1, FORCED, &CutlineConfig::default())
                .unwrap();
        assert_eq!(best.strategy, Strategy::HeadingLeftTitle);
        // 2 letters, heading evidence, dot bonus from the "1." token.
        assert_eq!(best.score, 23);
        assert_eq!(best.matched, 2);
    }

    #[test]
    fn spaced_dot_token_earns_no_dot_bonus() {
        let patterns = HeadingPatterns::new(1);
        let dotted = collect_heading_tokens(&[det("1.", 0.0, 0.0, 10.0, 10.0)], &patterns);
        let spaced = collect_heading_tokens(&[det("1 .", 0.0, 0.0, 10.0, 10.0)], &patterns);
        assert!(dotted[0].has_dot);
        assert!(!spaced[0].has_dot);
    }

    #[test]
    fn list_item_numeral_is_not_heading_evidence() {
        let patterns = HeadingPatterns::new(1);
        let tokens = collect_heading_tokens(&[det("1)", 0.0, 0.0, 10.0, 10.0)], &patterns);
        assert!(tokens.is_empty());
    }

    #[test]
    fn long_title_recovers_through_subsequence() {
        // One expected letter dropped, one stray letter inserted: the
        // prefix tiers stall but the subsequence tier clears 80%.
        let expected = vec!['T', 'H', 'B', 'C', 'D', 'G', 'K'];
        let observed = vec!['T', 'H', 'B', 'X', 'C', 'G', 'K'];
        assert_eq!(robust_match_count(&observed, &expected), 6);
    }

    #[test]
    fn subsequence_needs_early_first_letter() {
        let expected = vec!['T', 'H', 'B', 'C', 'D', 'G', 'K'];
        // Same content but the first expected letter arrives too late.
        let observed = vec!['X', 'Y', 'Z', 'T', 'H', 'B', 'C', 'G', 'K'];
        assert_eq!(robust_match_count(&observed, &expected), 0);
    }

    #[test]
    fn skip_tier_tolerates_split_word() {
        // "THỨC" read as "THỨ"+"C" inserts a C into the observed stream.
        let expected = vec!['B', 'T', 'L'];
        let observed = vec!['B', 'T', 'C', 'L'];
        assert_eq!(robust_match_count(&observed, &expected), 3);
    }

    #[test]
    fn short_prefix_does_not_unlock_skipping() {
        let expected = vec!['B', 'T', 'L', 'M', 'N'];
        // Prefix of 1 is below the anchor of 3, so no skipping happens.
        let observed = vec!['B', 'X', 'T', 'L', 'M', 'N'];
        assert_eq!(robust_match_count(&observed, &expected), 1);
    }

    #[test]
    fn match_count_is_monotonic_in_correct_prefix() {
        let expected = vec!['K', 'N', 'C', 'B'];
        let tails: [&[char]; 4] =
            [&['N', 'C', 'B'], &['X'], &[], &['N', 'X', 'C', 'B']];
        for tail in tails {
            let shorter = robust_match_count(tail, &expected);
            let mut longer = vec!['K'];
            longer.extend_from_slice(tail);
            // A correct leading letter never hurts.
            assert!(robust_match_count(&longer, &expected) >= shorter);
        }
    }

    #[test]
    fn content_head_never_sees_title_only() {
        let dets = vec![det("KHÁI NIỆM CƠ BẢN", 40.0, 100.0, 600.0, 130.0)];
        let expected = vec!['K', 'N', 'C', 'B'];
        let lines = lines_of(&dets);
        // No numeral anywhere: a content-head chunk gets no candidate.
        let best =
            find_best_candidate(&dets, &lines, &expected, 2, CONTENT_HEAD, &CutlineConfig::default());
        assert!(best.is_none());
    }

    #[test]
    fn plain_chunk_falls_back_to_title_only() {
        let dets = vec![det("KHÁI NIỆM CƠ BẢN", 40.0, 100.0, 600.0, 130.0)];
        let expected = vec!['K', 'N', 'C', 'B'];
        let lines = lines_of(&dets);
        let flags = MatchFlags { content_head: false, forced_heading: false };
        let best =
            find_best_candidate(&dets, &lines, &expected, 2, flags, &CutlineConfig::default())
                .unwrap();
        assert_eq!(best.strategy, Strategy::TitleOnly);
        assert_eq!(best.score, 40);
    }

    #[test]
    fn merge_completes_title_from_following_line() {
        // Numeral alone on its row, the whole title on the row below.
        let dets = vec![
            det("–", 10.0, 100.0, 25.0, 130.0),
            det("2.", 40.0, 100.0, 70.0, 130.0),
            det("KHÁI NIỆM CƠ BẢN", 80.0, 150.0, 420.0, 180.0),
        ];
        let expected = vec!['K', 'N', 'C', 'B'];
        let lines = lines_of(&dets);
        assert_eq!(lines.len(), 2);

        let best =
            find_best_candidate(&dets, &lines, &expected, 2, CONTENT_HEAD, &CutlineConfig::default())
                .unwrap();
        assert_eq!(best.strategy, Strategy::MergeNext);
        assert_eq!(best.matched, 4);
        assert_eq!(best.observed, vec!['K', 'N', 'C', 'B']);
        assert_eq!(best.line_index, 0, "cut goes at the numeral's own row");
    }
}
