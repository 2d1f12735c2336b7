use crate::types::{BoundingBox, Detection, RawDetections};
use common::span;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.4;
/// Smallest box side, in processed-image pixels, worth reporting.
pub const DEFAULT_MIN_BOX_SIZE: f32 = 20.0;

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub min_box_size: f32,
    pub iou_threshold: f32,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, min_box_size: f32, iou_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            min_box_size,
            iou_threshold,
        }
    }

    /// Turn raw backend output into the final, suppressed detection list.
    ///
    /// `processed_width`/`processed_height` are the dimensions of the frame the
    /// model actually saw; the minimum-size filter is measured in those pixels.
    /// Output is sorted by score, highest first.
    pub fn filter(
        &self,
        raw: &RawDetections,
        processed_width: u32,
        processed_height: u32,
    ) -> Vec<Detection> {
        let _s = span!("filter_detections");

        debug_assert!(
            raw.is_well_formed(),
            "malformed raw detections: {} boxes, {} scores, {} classes, count {}",
            raw.boxes.len(),
            raw.scores.len(),
            raw.classes.len(),
            raw.count
        );

        let width = processed_width as f32;
        let height = processed_height as f32;
        let valid = raw
            .count
            .min(raw.boxes.len())
            .min(raw.scores.len())
            .min(raw.classes.len());

        let mut candidates = Vec::with_capacity(valid);

        for i in 0..valid {
            // Written as keep-conditions so NaN fails them
            let score = raw.scores[i];
            if !(score.is_finite() && score >= self.confidence_threshold) {
                continue;
            }

            if !raw.boxes[i].iter().all(|v| v.is_finite()) {
                tracing::trace!(index = i, "Dropping box with non-finite coordinates");
                continue;
            }

            let bbox = BoundingBox::from_array(raw.boxes[i]);
            let box_width = bbox.width() * width;
            let box_height = bbox.height() * height;
            if !(box_width >= self.min_box_size && box_height >= self.min_box_size) {
                tracing::trace!(index = i, box_width, box_height, "Dropping undersized box");
                continue;
            }

            candidates.push(Detection {
                bbox,
                score,
                class_id: raw.classes[i],
            });
        }

        let kept = candidates.len();
        let detections = nms(candidates, self.iou_threshold);

        tracing::debug!(
            raw = valid,
            above_threshold = kept,
            after_nms = detections.len(),
            "Filtered detections"
        );

        detections
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONFIDENCE_THRESHOLD,
            DEFAULT_MIN_BOX_SIZE,
            DEFAULT_IOU_THRESHOLD,
        )
    }
}

/// Greedy non-maximum suppression.
///
/// Repeatedly keeps the highest-scoring detection and discards every remaining
/// one whose IoU with it is at least `iou_threshold`. Equal scores keep their
/// input order, so the earlier detection wins.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    // sort_by is stable
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut selected: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = selected
            .iter()
            .any(|kept| kept.bbox.iou(&candidate.bbox) >= iou_threshold);
        if !suppressed {
            selected.push(candidate);
        }
    }

    selected
}
