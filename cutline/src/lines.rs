use tomecut_ocr::{BBox, TextDetection};

/// A visual text row assembled from individual detections.
///
/// Invariant: `items` is ordered left-to-right by `x0`, `text` is the
/// space-joined item texts in that order, and `bbox` is the union of all
/// member boxes.
#[derive(Debug, Clone)]
pub struct Line {
    /// Member detections, left to right.
    pub items: Vec<TextDetection>,
    /// Space-joined member texts.
    pub text: String,
    /// Union of member boxes.
    pub bbox: BBox,
}

/// Median detection height, used to scale the grouping tolerance to the
/// page's font size. Empty input falls back to a typical body-text height.
#[must_use]
pub fn median_height(detections: &[TextDetection]) -> f32 {
    if detections.is_empty() {
        return 20.0;
    }
    let mut heights: Vec<f32> = detections.iter().map(|d| d.bbox.height()).collect();
    heights.sort_by(f32::total_cmp);
    let mid = heights.len() / 2;
    if heights.len() % 2 == 0 {
        (heights[mid - 1] + heights[mid]) / 2.0
    } else {
        heights[mid]
    }
}

/// Vertical tolerance for row clustering, floored at 10px.
#[must_use]
pub fn y_tolerance(median_height: f32) -> f32 {
    (median_height * 0.6).max(10.0)
}

/// Clusters detections into visual rows.
///
/// Single greedy pass over detections sorted by (vertical center, x0):
/// each detection joins the first open group whose running-average center
/// lies within `y_tol`, updating that average incrementally; otherwise it
/// opens a new group. Not a global optimum: downstream behavior depends
/// on this exact first-fit order being reproducible.
#[must_use]
pub fn group_into_lines(detections: &[TextDetection], y_tol: f32) -> Vec<Line> {
    struct Group {
        y_ref: f32,
        items: Vec<TextDetection>,
    }

    let mut sorted: Vec<&TextDetection> = detections.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .center_y()
            .total_cmp(&b.bbox.center_y())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut groups: Vec<Group> = Vec::new();
    for det in sorted {
        let yc = det.bbox.center_y();
        match groups.iter_mut().find(|g| (yc - g.y_ref).abs() <= y_tol) {
            Some(group) => {
                group.items.push(det.clone());
                let n = group.items.len() as f32;
                group.y_ref = group.y_ref.mul_add(n - 1.0, yc) / n;
            }
            None => groups.push(Group { y_ref: yc, items: vec![det.clone()] }),
        }
    }

    groups.sort_by(|a, b| a.y_ref.total_cmp(&b.y_ref));
    groups
        .into_iter()
        .map(|mut g| {
            g.items.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            let bbox = g.items[1..]
                .iter()
                .fold(g.items[0].bbox, |acc, d| acc.union(&d.bbox));
            let text = g
                .items
                .iter()
                .map(|d| d.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            Line { items: g.items, text, bbox }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> TextDetection {
        TextDetection {
            bbox: BBox::new(x0, y0, x1, y1),
            text: text.to_string(),
            confidence: 0.95,
        }
    }

    #[test]
    fn one_row_groups_into_one_line_sorted_by_x() {
        let dets = vec![
            det("CƠ", 300.0, 100.0, 360.0, 130.0),
            det("KHÁI", 50.0, 100.0, 150.0, 130.0),
            det("NIỆM", 170.0, 100.0, 280.0, 130.0),
        ];
        let lines = group_into_lines(&dets, y_tolerance(median_height(&dets)));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "KHÁI NIỆM CƠ");
        assert_eq!(lines[0].bbox, BBox::new(50.0, 100.0, 360.0, 130.0));
    }

    #[test]
    fn distinct_rows_stay_separate_and_ordered() {
        let dets = vec![
            det("dưới", 50.0, 300.0, 150.0, 330.0),
            det("trên", 50.0, 100.0, 150.0, 130.0),
            det("giữa", 50.0, 200.0, 150.0, 230.0),
        ];
        let lines = group_into_lines(&dets, 18.0);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["trên", "giữa", "dưới"]);
    }

    #[test]
    fn running_average_absorbs_slight_stagger() {
        // Second box is within tolerance of the first; the third is within
        // tolerance of their running average but not of the first alone.
        let dets = vec![
            det("a", 10.0, 100.0, 20.0, 120.0),  // center 110
            det("b", 30.0, 114.0, 40.0, 134.0),  // center 124, joins (|124-110|<=15)
            det("c", 50.0, 126.0, 60.0, 146.0),  // center 136, avg is 117 -> joins? |136-117|>15
        ];
        let lines = group_into_lines(&dets, 15.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "a b");
        assert_eq!(lines[1].text, "c");
    }

    #[test]
    fn median_height_falls_back_when_empty() {
        assert_eq!(median_height(&[]), 20.0);
        assert_eq!(y_tolerance(20.0), 12.0);
        assert_eq!(y_tolerance(5.0), 10.0);
    }
}
