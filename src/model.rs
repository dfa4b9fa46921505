//! Structure-manifest decoding.
//!
//! The model returns loosely shaped JSON: `list_topic` and `list_lesson`
//! are arrays of single-key objects mapping a name to a page range, and
//! `list_chunk` maps names to `{start, content_head, heading, title}`.
//! Entries that do not fit the shape are dropped, never errors; an
//! over-eager model loses an entry rather than sinking the whole book.

use serde_json::Value;
use tracing::debug;

/// One named page range from `list_topic` or `list_lesson`.
///
/// `start`/`end` are kept as decoded; page validation happens where the
/// actual page count is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRange {
    /// Manifest key, e.g. `topic_01`.
    pub name: String,
    /// First page, 1-based inclusive.
    pub start: i64,
    /// Last page, 1-based inclusive.
    pub end: i64,
}

/// One proposed chunk from `list_chunk`, before page ranges are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Page where the chunk's heading first appears.
    pub start: i64,
    /// Whether the previous chunk's content ends above the heading.
    pub content_head: bool,
    /// Heading numeral, e.g. `"2."`.
    pub heading: String,
    /// Title text after the numeral.
    pub title: String,
}

/// A chunk with its resolved page range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRange {
    /// First page, 1-based inclusive.
    pub start: u32,
    /// Last page, 1-based inclusive.
    pub end: u32,
    /// Whether the chunk shares its first page with the previous one.
    pub content_head: bool,
    /// Heading numeral.
    pub heading: String,
    /// Title text.
    pub title: String,
}

/// Decodes `manifest[key]` as a list of named ranges.
#[must_use]
pub fn named_ranges(manifest: &Value, key: &str) -> Vec<NamedRange> {
    let Some(items) = manifest.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for item in items {
        let Some((name, body)) = single_entry(item) else {
            debug!(key, "dropping malformed manifest entry");
            continue;
        };
        let (Some(start), Some(end)) = (
            body.get("start").and_then(Value::as_i64),
            body.get("end").and_then(Value::as_i64),
        ) else {
            debug!(key, name, "dropping range without integer bounds");
            continue;
        };
        out.push(NamedRange { name: name.to_string(), start, end });
    }
    out
}

/// Decodes `manifest["list_chunk"]`, sorted by start page.
///
/// `start` and `content_head` are required per entry; `heading` and
/// `title` default to empty strings.
#[must_use]
pub fn chunk_specs(manifest: &Value) -> Vec<ChunkSpec> {
    let Some(items) = manifest.get("list_chunk").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for item in items {
        let Some((name, body)) = single_entry(item) else {
            debug!("dropping malformed chunk entry");
            continue;
        };
        let (Some(start), Some(content_head)) = (
            body.get("start").and_then(Value::as_i64),
            body.get("content_head").and_then(Value::as_bool),
        ) else {
            debug!(name, "dropping chunk without start/content_head");
            continue;
        };
        out.push(ChunkSpec {
            start,
            content_head,
            heading: string_field(body, "heading"),
            title: string_field(body, "title"),
        });
    }
    out.sort_by_key(|spec| spec.start);
    out
}

/// Derives page ranges from sorted chunk specs.
///
/// The first chunk is forced to start at page 1 as a plain page break;
/// each chunk ends where the next begins (inclusive when the next is a
/// content head, since both then share that page). With no usable specs
/// the whole lesson becomes a single chunk.
#[must_use]
pub fn chunk_page_ranges(specs: Vec<ChunkSpec>, total_pages: u32) -> Vec<ChunkRange> {
    if total_pages < 1 {
        return Vec::new();
    }
    if specs.is_empty() {
        return vec![ChunkRange {
            start: 1,
            end: total_pages,
            content_head: false,
            heading: String::new(),
            title: String::new(),
        }];
    }

    let fixed: Vec<(u32, bool, ChunkSpec)> = specs
        .into_iter()
        .enumerate()
        .map(|(i, spec)| {
            let start = u32::try_from(spec.start.clamp(1, i64::from(total_pages))).unwrap_or(1);
            if i == 0 {
                (1, false, spec)
            } else {
                (start, spec.content_head, spec)
            }
        })
        .collect();

    let mut ranges = Vec::with_capacity(fixed.len());
    for (i, (start, content_head, spec)) in fixed.iter().enumerate() {
        let end = match fixed.get(i + 1) {
            Some(&(next_start, next_head, _)) => {
                let end = if next_head { next_start } else { next_start - 1 };
                end.clamp(*start, total_pages)
            }
            None => total_pages,
        };
        ranges.push(ChunkRange {
            start: *start,
            end,
            content_head: *content_head,
            heading: spec.heading.clone(),
            title: spec.title.clone(),
        });
    }
    ranges
}

fn single_entry(item: &Value) -> Option<(&str, &Value)> {
    let map = item.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let (name, body) = map.iter().next()?;
    body.as_object()?;
    Some((name, body))
}

fn string_field(body: &Value, key: &str) -> String {
    body.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ranges_survive_malformed_neighbours() {
        let manifest = json!({
            "list_topic": [
                {"topic_01": {"start": 7, "end": 38}},
                {"topic_02": {"start": "nine", "end": 55}},
                {"bad": "not an object"},
                {"a": {"start": 1, "end": 2}, "b": {"start": 3, "end": 4}},
                {"topic_03": {"start": 56, "end": 70}}
            ]
        });
        let ranges = named_ranges(&manifest, "list_topic");
        assert_eq!(
            ranges,
            vec![
                NamedRange { name: "topic_01".into(), start: 7, end: 38 },
                NamedRange { name: "topic_03".into(), start: 56, end: 70 },
            ]
        );
        assert!(named_ranges(&manifest, "list_lesson").is_empty());
    }

    #[test]
    fn chunk_specs_sort_by_start() {
        let manifest = json!({
            "list_chunk": [
                {"chunk_02": {"start": 4, "content_head": true, "heading": "2.", "title": "MẠNG"}},
                {"chunk_01": {"start": 1, "content_head": false, "heading": "1.", "title": "THÔNG TIN"}},
                {"chunk_xx": {"start": 9}}
            ]
        });
        let specs = chunk_specs(&manifest);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].start, 1);
        assert_eq!(specs[0].title, "THÔNG TIN");
        assert_eq!(specs[1].start, 4);
        assert!(specs[1].content_head);
    }

    #[test]
    fn empty_specs_fall_back_to_one_chunk() {
        let ranges = chunk_page_ranges(Vec::new(), 12);
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (1, 12));
        assert!(!ranges[0].content_head);

        assert!(chunk_page_ranges(Vec::new(), 0).is_empty());
    }

    #[test]
    fn content_head_neighbours_share_a_page() {
        let specs = vec![
            ChunkSpec { start: 1, content_head: false, heading: "1.".into(), title: "A".into() },
            ChunkSpec { start: 3, content_head: true, heading: "2.".into(), title: "B".into() },
            ChunkSpec { start: 6, content_head: false, heading: "3.".into(), title: "C".into() },
        ];
        let ranges = chunk_page_ranges(specs, 9);
        assert_eq!((ranges[0].start, ranges[0].end), (1, 3));
        assert_eq!((ranges[1].start, ranges[1].end), (3, 5));
        assert_eq!((ranges[2].start, ranges[2].end), (6, 9));
    }

    #[test]
    fn first_chunk_is_forced_to_a_page_break_at_one() {
        let specs = vec![
            ChunkSpec { start: 2, content_head: true, heading: "1.".into(), title: "A".into() },
            ChunkSpec { start: 5, content_head: false, heading: "2.".into(), title: "B".into() },
        ];
        let ranges = chunk_page_ranges(specs, 6);
        assert_eq!((ranges[0].start, ranges[0].end), (1, 4));
        assert!(!ranges[0].content_head);
        assert_eq!((ranges[1].start, ranges[1].end), (5, 6));
    }

    #[test]
    fn out_of_bounds_starts_are_clamped() {
        let specs = vec![
            ChunkSpec { start: 1, content_head: false, heading: "1.".into(), title: "A".into() },
            ChunkSpec { start: 40, content_head: false, heading: "2.".into(), title: "B".into() },
        ];
        let ranges = chunk_page_ranges(specs, 5);
        // The runaway start collapses onto the last page.
        assert_eq!((ranges[0].start, ranges[0].end), (1, 4));
        assert_eq!((ranges[1].start, ranges[1].end), (5, 5));
    }
}
