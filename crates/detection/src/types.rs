use crate::error::DetectError;

/// Axis-aligned box in `(y1, x1, y2, x2)` order, normalized to [0, 1]
/// relative to a reference image unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub y1: f32,
    pub x1: f32,
    pub y2: f32,
    pub x2: f32,
}

impl BoundingBox {
    pub fn new(y1: f32, x1: f32, y2: f32, x2: f32) -> Self {
        Self { y1, x1, y2, x2 }
    }

    pub fn from_array([y1, x1, y2, x2]: [f32; 4]) -> Self {
        Self { y1, x1, y2, x2 }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.y1, self.x1, self.y2, self.x2]
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union. Symmetric, in [0, 1], and 0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = inter_w * inter_h;

        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            (intersection / union).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: u32,
}

/// Parallel output arrays of a single inference call.
///
/// Only the first `count` entries are meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
    pub classes: Vec<u32>,
    pub count: usize,
}

impl RawDetections {
    pub fn new(boxes: Vec<[f32; 4]>, scores: Vec<f32>, classes: Vec<u32>, count: usize) -> Self {
        Self {
            boxes,
            scores,
            classes,
            count,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.boxes.len() == self.scores.len()
            && self.scores.len() == self.classes.len()
            && self.count <= self.scores.len()
    }

    /// Guard against malformed backend output before it reaches the filter stage.
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.is_well_formed() {
            return Ok(());
        }
        Err(DetectError::ContractViolation(format!(
            "{} boxes, {} scores, {} classes, count {}",
            self.boxes.len(),
            self.scores.len(),
            self.classes.len(),
            self.count
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes() -> Vec<BoundingBox> {
        vec![
            BoundingBox::new(0.0, 0.0, 0.5, 0.5),
            BoundingBox::new(0.0, 0.0, 0.48, 0.48),
            BoundingBox::new(0.25, 0.25, 0.75, 0.75),
            BoundingBox::new(0.8, 0.8, 1.0, 1.0),
            BoundingBox::new(0.1, 0.3, 0.9, 0.4),
            BoundingBox::new(0.5, 0.5, 0.5, 0.5), // zero area
        ]
    }

    #[test]
    fn test_iou_is_symmetric_and_bounded() {
        let boxes = boxes();
        for a in &boxes {
            for b in &boxes {
                let ab = a.iou(b);
                let ba = b.iou(a);
                assert_eq!(ab, ba, "iou({a:?}, {b:?}) should be symmetric");
                assert!((0.0..=1.0).contains(&ab), "iou out of range: {ab}");
            }
        }
    }

    #[test]
    fn test_iou_with_itself_is_one() {
        for b in boxes().iter().filter(|b| b.area() > 0.0) {
            assert!((b.iou(b) - 1.0).abs() < 1e-6, "iou({b:?}, self) should be 1");
        }
    }

    #[test]
    fn test_iou_known_values() {
        let a = BoundingBox::new(0.0, 0.0, 0.5, 0.5);
        let b = BoundingBox::new(0.25, 0.25, 0.75, 0.75);
        // intersection 0.0625, union 0.25 + 0.25 - 0.0625
        assert!((a.iou(&b) - 0.0625 / 0.4375).abs() < 1e-6);

        let disjoint = BoundingBox::new(0.8, 0.8, 1.0, 1.0);
        assert_eq!(a.iou(&disjoint), 0.0);

        // Touching edges share no area
        let touching = BoundingBox::new(0.0, 0.5, 0.5, 1.0);
        assert_eq!(a.iou(&touching), 0.0);
    }

    #[test]
    fn test_iou_of_degenerate_boxes_is_zero() {
        let point = BoundingBox::new(0.5, 0.5, 0.5, 0.5);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn test_array_conversion_keeps_yx_order() {
        let b = BoundingBox::from_array([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(b.y1, 0.1);
        assert_eq!(b.x1, 0.2);
        assert_eq!(b.to_array(), [0.1, 0.2, 0.3, 0.4]);
        assert!((b.width() - 0.2).abs() < 1e-6);
        assert!((b.height() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_mismatched_arrays() {
        let ok = RawDetections::new(vec![[0.0; 4]; 3], vec![0.5; 3], vec![1; 3], 2);
        assert!(ok.validate().is_ok());

        let short_scores = RawDetections::new(vec![[0.0; 4]; 3], vec![0.5; 2], vec![1; 3], 2);
        assert!(matches!(
            short_scores.validate(),
            Err(DetectError::ContractViolation(_))
        ));

        let count_too_large = RawDetections::new(vec![[0.0; 4]; 2], vec![0.5; 2], vec![1; 2], 5);
        assert!(count_too_large.validate().is_err());

        assert!(RawDetections::default().validate().is_ok());
    }
}
