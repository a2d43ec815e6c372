use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Box corners in image pixels, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x1, bbox.y1, bbox.x2, bbox.y2]
    }
}

/// A box expressed as fractions of the image size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn is_well_formed(&self) -> bool {
        self.x1 >= 0.0 && self.y1 >= 0.0 && self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Returns `None` for a zero-sized image.
    pub fn relative_to(&self, image_width: u32, image_height: u32) -> Option<RelativeBox> {
        if image_width == 0 || image_height == 0 {
            return None;
        }
        let (w, h) = (image_width as f64, image_height as f64);
        Some(RelativeBox {
            left: self.x1 / w,
            top: self.y1 / h,
            width: self.width() / w,
            height: self.height() / h,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Normalized backend answer for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub has_tumor: bool,
    pub confidence: f64,
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    /// Confidence as a percentage, the way the UI displays it.
    pub fn confidence_percent(&self) -> f64 {
        self.confidence * 100.0
    }

    /// Human-readable violations of the backend's advisory contract.
    pub fn anomalies(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !(0.0..=1.0).contains(&self.confidence) {
            out.push(format!("confidence {} outside [0, 1]", self.confidence));
        }
        for (i, detection) in self.detections.iter().enumerate() {
            if !(0.0..=1.0).contains(&detection.confidence) {
                out.push(format!(
                    "detection {i}: confidence {} outside [0, 1]",
                    detection.confidence
                ));
            }
            if !detection.bbox.is_well_formed() {
                let b = detection.bbox;
                out.push(format!(
                    "detection {i}: malformed bbox [{}, {}, {}, {}]",
                    b.x1, b.y1, b.x2, b.y2
                ));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Detected(DetectionResult),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Per-file outcomes in the order the files were submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, path: &std::path::Path) -> Option<&FileOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.path == path)
            .map(|entry| &entry.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            FileOutcome::Failed { error } => Some((&entry.path, error.as_str())),
            FileOutcome::Detected(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_backend_payload() {
        let result: DetectionResult = serde_json::from_value(json!({
            "has_tumor": true,
            "confidence": 0.87,
            "detections": [{ "bbox": [10, 10, 50, 50], "confidence": 0.9, "class": "tumor" }]
        }))
        .unwrap();

        assert!(result.has_tumor);
        assert_eq!(result.confidence, 0.87);
        assert_eq!(result.detections[0].bbox, BoundingBox::from([10.0, 10.0, 50.0, 50.0]));
        assert_eq!(result.detections[0].label.as_deref(), Some("tumor"));
        assert!(result.anomalies().is_empty());
    }

    #[test]
    fn bbox_serializes_as_array() {
        let detection = Detection {
            bbox: BoundingBox::from([1.5, 2.0, 3.0, 4.0]),
            confidence: 0.5,
            label: None,
        };
        assert_eq!(
            serde_json::to_value(&detection).unwrap(),
            json!({ "bbox": [1.5, 2.0, 3.0, 4.0], "confidence": 0.5 })
        );
    }

    #[test]
    fn reports_contract_violations() {
        let result = DetectionResult {
            has_tumor: true,
            confidence: 1.2,
            detections: vec![Detection {
                bbox: BoundingBox::from([50.0, 10.0, 10.0, 50.0]),
                confidence: 0.4,
                label: None,
            }],
        };
        let anomalies = result.anomalies();
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies[0].contains("confidence 1.2"));
        assert!(anomalies[1].contains("malformed bbox"));
    }

    #[test]
    fn relative_box_scales_by_image_size() {
        let bbox = BoundingBox::from([10.0, 20.0, 60.0, 120.0]);
        let rel = bbox.relative_to(100, 200).unwrap();
        assert_eq!(rel, RelativeBox { left: 0.1, top: 0.1, width: 0.5, height: 0.5 });
        assert!(bbox.relative_to(0, 10).is_none());
    }

    #[test]
    fn batch_entry_is_tagged_by_status() {
        let entry = BatchEntry {
            path: PathBuf::from("/scans/a.png"),
            outcome: FileOutcome::Failed { error: "boom".into() },
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({ "path": "/scans/a.png", "status": "failed", "error": "boom" })
        );
    }
}
