//! Small 2D helpers shared by feature extraction and the ONNX backends.

/// A landmark position in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Division that yields `fallback` instead of NaN/Infinity.
pub fn safe_ratio(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator.abs() < f64::EPSILON {
        return fallback;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        fallback
    }
}

/// Axis-aligned bounding box of a point set, as `[x1, y1, x2, y2]`.
pub fn bounding_box<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<[f64; 4]> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let mut bbox = [first.x, first.y, first.x, first.y];
    for p in iter {
        bbox[0] = bbox[0].min(p.x);
        bbox[1] = bbox[1].min(p.y);
        bbox[2] = bbox[2].max(p.x);
        bbox[3] = bbox[3].max(p.y);
    }
    Some(bbox)
}

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance() {
        assert_relative_eq!(Point::new(0.0, 0.0).distance(&Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_midpoint() {
        let m = Point::new(0.0, 10.0).midpoint(&Point::new(10.0, 20.0));
        assert_eq!(m, Point::new(5.0, 15.0));
    }

    #[test]
    fn test_safe_ratio_zero_denominator() {
        assert_eq!(safe_ratio(1.0, 0.0, 0.2), 0.2);
    }

    #[test]
    fn test_safe_ratio_infinite_numerator() {
        assert_eq!(safe_ratio(f64::INFINITY, 2.0, -1.0), -1.0);
    }

    #[test]
    fn test_bounding_box() {
        let pts = [Point::new(5.0, 1.0), Point::new(-2.0, 7.0), Point::new(3.0, 3.0)];
        assert_eq!(bounding_box(&pts), Some([-2.0, 1.0, 5.0, 7.0]));
    }

    #[test]
    fn test_bounding_box_empty() {
        let empty: &[Point] = &[];
        assert_eq!(bounding_box(empty), None);
    }

    #[test]
    fn test_bbox_iou_no_overlap() {
        assert_eq!(bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn test_bbox_iou_partial_overlap() {
        let expected = 25.0 / 175.0;
        assert_relative_eq!(
            bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[5.0, 5.0, 15.0, 15.0]),
            expected,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_sigmoid_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }
}
