//! Shared helpers for integration tests

#![allow(dead_code)]

use garment_mockup::{
    providers::{MockPoseProvider, MockSegmentationProvider, MockShape},
    MockupConfig, MockupSession, PoseProvider, SegmentationProvider,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::sync::Arc;

/// Opaque photo with a gradient so per-pixel checks see distinct values
pub fn gradient_photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
    })
}

pub fn dynamic(image: RgbaImage) -> DynamicImage {
    DynamicImage::ImageRgba8(image)
}

/// Square design: opaque blue with a transparent border column
pub fn design(width: u32, height: u32) -> DynamicImage {
    dynamic(RgbaImage::from_fn(width, height, |x, _| {
        if x == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([0, 0, 255, 255])
        }
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

pub fn session(
    segmentation: MockSegmentationProvider,
    pose: MockPoseProvider,
    config: MockupConfig,
) -> MockupSession {
    MockupSession::new(
        config,
        Arc::new(segmentation) as Arc<dyn SegmentationProvider>,
        Arc::new(pose) as Arc<dyn PoseProvider>,
    )
    .unwrap()
}

/// Full-frame segmentation and no pose
pub fn sharp_session(config: MockupConfig) -> MockupSession {
    session(
        MockSegmentationProvider::new(MockShape::Full),
        MockPoseProvider::new(None),
        config,
    )
}

pub fn assert_close(actual: u8, expected: u8, tolerance: u8) {
    assert!(
        actual.abs_diff(expected) <= tolerance,
        "expected {expected} +/- {tolerance}, got {actual}"
    );
}
