//! Body landmarks and the torso polygon derived from them

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body joints the garment region is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyJoint {
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
}

impl BodyJoint {
    /// Torso corners in polygon order
    ///
    /// Walking right shoulder → left shoulder → left hip → right hip keeps the
    /// quadrilateral free of self-intersections.
    pub const TORSO: [BodyJoint; 4] = [
        BodyJoint::RightShoulder,
        BodyJoint::LeftShoulder,
        BodyJoint::LeftHip,
        BodyJoint::RightHip,
    ];

    /// Index of this joint in the 33-point BlazePose landmark topology
    #[must_use]
    pub fn mediapipe_index(self) -> usize {
        match self {
            Self::LeftShoulder => 11,
            Self::RightShoulder => 12,
            Self::LeftHip => 23,
            Self::RightHip => 24,
        }
    }

    #[must_use]
    pub fn from_mediapipe_index(index: usize) -> Option<Self> {
        match index {
            11 => Some(Self::LeftShoulder),
            12 => Some(Self::RightShoulder),
            23 => Some(Self::LeftHip),
            24 => Some(Self::RightHip),
            _ => None,
        }
    }
}

/// Landmark coordinate normalized to the image, nominally in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Detected body landmarks for one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    joints: HashMap<BodyJoint, NormalizedPoint>,
}

impl LandmarkSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, joint: BodyJoint, point: NormalizedPoint) -> Self {
        self.insert(joint, point);
        self
    }

    /// Record a joint; non-finite coordinates are treated as undetected
    pub fn insert(&mut self, joint: BodyJoint, point: NormalizedPoint) {
        if point.is_finite() {
            self.joints.insert(joint, point);
        } else {
            self.joints.remove(&joint);
        }
    }

    #[must_use]
    pub fn get(&self, joint: BodyJoint) -> Option<NormalizedPoint> {
        self.joints.get(&joint).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Whether all four torso joints are present
    #[must_use]
    pub fn has_torso(&self) -> bool {
        BodyJoint::TORSO.iter().all(|joint| self.joints.contains_key(joint))
    }

    /// Build from a BlazePose-style landmark list (index = landmark id)
    #[must_use]
    pub fn from_mediapipe(landmarks: &[Option<NormalizedPoint>]) -> Self {
        let mut set = Self::new();
        for (index, point) in landmarks.iter().enumerate() {
            if let (Some(joint), Some(point)) = (BodyJoint::from_mediapipe_index(index), point) {
                set.insert(joint, *point);
            }
        }
        set
    }

    /// Torso quadrilateral in pixel space, or `None` if any torso joint is missing
    #[must_use]
    pub fn torso_polygon(&self, canvas: (u32, u32)) -> Option<Polygon> {
        let (width, height) = (canvas.0 as f32, canvas.1 as f32);
        let points = BodyJoint::TORSO
            .iter()
            .map(|&joint| self.get(joint).map(|p| (p.x * width, p.y * height)))
            .collect::<Option<Vec<_>>>()?;
        Some(Polygon::new(points))
    }
}

/// Closed polygon in pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<(f32, f32)>,
}

impl Polygon {
    #[must_use]
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// Even-odd containment test for a point
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let Some(&last) = self.points.last() else {
            return false;
        };
        let mut inside = false;
        let mut previous = last;
        for &(xi, yi) in &self.points {
            let (xj, yj) = previous;
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            previous = (xi, yi);
        }
        inside
    }
}

/// Landmark JSON accepted from pose files
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LandmarkDocument {
    Named(HashMap<BodyJoint, NormalizedPoint>),
    MediaPipe(Vec<Option<NormalizedPoint>>),
    Wrapped {
        #[serde(rename = "poseLandmarks")]
        pose_landmarks: Option<Vec<Option<NormalizedPoint>>>,
    },
}

/// Parse landmark JSON
///
/// Accepts a map of joint names to points, a BlazePose array, a
/// `{"poseLandmarks": [...]}` wrapper, or `null` for "no person detected".
///
/// # Errors
/// - The JSON matches none of the accepted layouts
pub fn parse_landmarks_json(json: &str) -> Result<Option<LandmarkSet>> {
    let document: Option<LandmarkDocument> = serde_json::from_str(json)?;
    let set = match document {
        None | Some(LandmarkDocument::Wrapped { pose_landmarks: None }) => return Ok(None),
        Some(LandmarkDocument::Named(joints)) => {
            let mut set = LandmarkSet::new();
            for (joint, point) in joints {
                set.insert(joint, point);
            }
            set
        },
        Some(LandmarkDocument::MediaPipe(points))
        | Some(LandmarkDocument::Wrapped {
            pose_landmarks: Some(points),
        }) => LandmarkSet::from_mediapipe(&points),
    };

    Ok(if set.is_empty() { None } else { Some(set) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torso() -> LandmarkSet {
        LandmarkSet::new()
            .with(BodyJoint::LeftShoulder, NormalizedPoint::new(0.7, 0.2))
            .with(BodyJoint::RightShoulder, NormalizedPoint::new(0.3, 0.2))
            .with(BodyJoint::LeftHip, NormalizedPoint::new(0.65, 0.6))
            .with(BodyJoint::RightHip, NormalizedPoint::new(0.35, 0.6))
    }

    #[test]
    fn test_torso_polygon_order() {
        let polygon = torso().torso_polygon((100, 200)).unwrap();
        let points = polygon.points();
        assert_eq!(points.len(), 4);
        // right shoulder, left shoulder, left hip, right hip
        assert_eq!(points[0], (30.0, 40.0));
        assert_eq!(points[1], (70.0, 40.0));
        assert_eq!(points[2], (65.0, 120.0));
        assert_eq!(points[3], (35.0, 120.0));
    }

    #[test]
    fn test_incomplete_torso() {
        let mut set = torso();
        set.insert(BodyJoint::LeftHip, NormalizedPoint::new(f32::NAN, 0.5));
        assert!(!set.has_torso());
        assert!(set.torso_polygon((100, 100)).is_none());
    }

    #[test]
    fn test_polygon_contains() {
        let polygon = torso().torso_polygon((100, 100)).unwrap();
        assert!(polygon.contains(50.0, 40.0));
        assert!(!polygon.contains(10.0, 40.0));
        assert!(!polygon.contains(50.0, 90.0));
    }

    #[test]
    fn test_mediapipe_indices_roundtrip() {
        for joint in BodyJoint::TORSO {
            assert_eq!(BodyJoint::from_mediapipe_index(joint.mediapipe_index()), Some(joint));
        }
        assert_eq!(BodyJoint::from_mediapipe_index(0), None);
    }

    #[test]
    fn test_parse_named_landmarks() {
        let json = r#"{
            "left_shoulder": {"x": 0.7, "y": 0.2},
            "right_shoulder": {"x": 0.3, "y": 0.2},
            "left_hip": {"x": 0.65, "y": 0.6},
            "right_hip": {"x": 0.35, "y": 0.6}
        }"#;
        let set = parse_landmarks_json(json).unwrap().unwrap();
        assert!(set.has_torso());
        assert_eq!(set.get(BodyJoint::RightHip), Some(NormalizedPoint::new(0.35, 0.6)));
    }

    #[test]
    fn test_parse_mediapipe_landmarks() {
        let mut points: Vec<serde_json::Value> = vec![serde_json::Value::Null; 33];
        points[11] = serde_json::json!({"x": 0.7, "y": 0.2, "z": -0.1, "visibility": 0.99});
        points[12] = serde_json::json!({"x": 0.3, "y": 0.2, "z": -0.1, "visibility": 0.99});
        points[23] = serde_json::json!({"x": 0.65, "y": 0.6});
        points[24] = serde_json::json!({"x": 0.35, "y": 0.6});

        let array = serde_json::to_string(&points).unwrap();
        let set = parse_landmarks_json(&array).unwrap().unwrap();
        assert!(set.has_torso());

        let wrapped = format!("{{\"poseLandmarks\": {array}}}");
        assert_eq!(parse_landmarks_json(&wrapped).unwrap(), Some(set));
    }

    #[test]
    fn test_parse_absent_landmarks() {
        assert_eq!(parse_landmarks_json("null").unwrap(), None);
        assert_eq!(parse_landmarks_json("{\"poseLandmarks\": null}").unwrap(), None);
        assert_eq!(parse_landmarks_json("[]").unwrap(), None);
        assert!(parse_landmarks_json("\"nope\"").is_err());
    }
}
