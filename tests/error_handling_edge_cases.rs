//! Error conditions and boundary behavior
//!
//! Every failure here must leave the session usable with its previous state.

mod common;

use common::{design, dynamic, gradient_photo, session, sharp_session};
use garment_mockup::{
    providers::{MockPoseProvider, MockSegmentationProvider, MockShape},
    Compositor, Gallery, GarmentMaskBuilder, Mask, MockupConfig, MockupError, OverlayModel,
    Result,
};
use image::RgbaImage;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_config_validation_edge_cases() -> Result<()> {
    let config = MockupConfig::builder().shirt_opacity(0.0).mask_blur_radius(0.0).build()?;
    assert_eq!(config.shirt.opacity, 0.0);

    let config = MockupConfig::builder().jpeg_quality(150).build()?;
    assert_eq!(config.jpeg_quality, 100);

    assert!(MockupConfig::builder().shirt_opacity(1.01).build().is_err());
    assert!(MockupConfig::builder().mask_blur_radius(-1.0).build().is_err());
    assert!(MockupConfig::builder().mask_blur_radius(f32::NAN).build().is_err());
    assert!(MockupConfig::builder().max_canvas_width(0).build().is_err());
    assert!(MockupConfig::builder().design_fit_divisor(0.0).build().is_err());

    let mut config = MockupConfig::default();
    config.jpeg_quality = 101;
    let error = config.validate().unwrap_err();
    assert!(error.to_string().contains("JPEG quality"));
    assert!(error.to_string().contains("101"));
    Ok(())
}

#[tokio::test]
async fn test_export_without_base_image() {
    let session = sharp_session(MockupConfig::default());
    assert!(matches!(session.flatten(), Err(MockupError::NoBaseImage)));
    assert!(matches!(session.export().await, Err(MockupError::NoBaseImage)));
    assert!(matches!(
        Compositor::flatten(None, &OverlayModel::new((10, 10))),
        Err(MockupError::NoBaseImage)
    ));

    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("tshirt-mockup.png");
    assert!(session.export_to_path(&target).await.is_err());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_overlay_controls_before_design() -> Result<()> {
    let mut session = sharp_session(MockupConfig::default());
    session.select_photo(&dynamic(gradient_photo(30, 30))).await?;

    let overlay = session.overlay_mut();
    assert!(matches!(overlay.set_scale(2.0), Err(MockupError::OverlayEmpty)));
    assert!(matches!(overlay.set_rotation(10.0), Err(MockupError::OverlayEmpty)));
    assert!(matches!(overlay.set_opacity(0.5), Err(MockupError::OverlayEmpty)));
    assert!(matches!(overlay.set_position(1.0, 1.0), Err(MockupError::OverlayEmpty)));
    assert!(matches!(overlay.reset(), Err(MockupError::OverlayEmpty)));
    assert!(!session.overlay().is_placed());
    Ok(())
}

#[tokio::test]
async fn test_invalid_overlay_values_keep_transform() -> Result<()> {
    let mut session = sharp_session(MockupConfig::default());
    session.select_photo(&dynamic(gradient_photo(60, 60))).await?;
    session.load_design(&design(10, 10))?;
    let before = session.overlay().transform();

    let overlay = session.overlay_mut();
    assert!(overlay.set_scale(0.0).is_err());
    assert!(overlay.set_scale(-1.0).is_err());
    assert!(overlay.set_opacity(1.5).is_err());
    assert!(overlay.set_rotation(f32::INFINITY).is_err());
    assert!(overlay.set_position(f32::NAN, 0.0).is_err());
    assert_eq!(session.overlay().transform(), before);

    // Off-canvas positions are allowed and simply clip
    session.overlay_mut().set_position(-500.0, 900.0)?;
    let flat = session.flatten()?;
    assert_eq!(&flat, session.render_target().unwrap());
    Ok(())
}

#[tokio::test]
async fn test_full_turn_matches_no_rotation() -> Result<()> {
    let mut session = sharp_session(MockupConfig::default());
    session.select_photo(&dynamic(gradient_photo(60, 60))).await?;
    session.load_design(&design(12, 12))?;

    let unrotated = session.overlay().transform().unwrap();
    session.overlay_mut().set_rotation(360.0)?;
    let turned = session.overlay().transform().unwrap();
    assert!(turned.rotation.abs() < 1e-4 || (turned.rotation - 360.0).abs() < 1e-4);
    assert_eq!(turned.position, unrotated.position);
    assert_eq!(turned.scale, unrotated.scale);
    Ok(())
}

#[tokio::test]
async fn test_provider_failures_keep_previous_state() -> Result<()> {
    let mut session = session(
        MockSegmentationProvider::new(MockShape::Full),
        MockPoseProvider::failing(),
        MockupConfig::default(),
    );
    let error = session.select_photo(&dynamic(gradient_photo(20, 20))).await.unwrap_err();
    assert!(matches!(error, MockupError::Provider(_)));
    assert!(error.is_recoverable());
    assert!(session.render_target().is_none());
    assert!(session.applied_selection().is_none());

    let mut session = sharp_session(MockupConfig::default());
    session.select_photo(&dynamic(gradient_photo(20, 20))).await?;
    session.load_design(&design(4, 4))?;
    let before = session.flatten()?;

    assert!(matches!(
        session.select_photo_bytes(b"\x89PNG broken").await,
        Err(MockupError::Decode(_))
    ));
    assert!(session.load_design_bytes(&[]).is_err());
    assert!(session.overlay().is_placed());
    assert_eq!(session.flatten()?, before);
    Ok(())
}

#[tokio::test]
async fn test_empty_segmentation_leaves_photo_unchanged() -> Result<()> {
    let mut session = session(
        MockSegmentationProvider::new(MockShape::Empty),
        MockPoseProvider::upright_torso(),
        MockupConfig::default(),
    );
    let photo = gradient_photo(40, 60);
    session.select_photo(&dynamic(photo.clone())).await?;

    assert_eq!(session.garment_mask().unwrap().mask().statistics().covered_pixels, 0);
    assert_eq!(session.render_target().unwrap(), &photo);
    Ok(())
}

#[tokio::test]
async fn test_mismatched_provider_mask_is_resampled() -> Result<()> {
    struct SmallMask;

    #[async_trait::async_trait]
    impl garment_mockup::SegmentationProvider for SmallMask {
        fn name(&self) -> &str {
            "small"
        }

        async fn segment(&self, _image: &RgbaImage) -> Result<Mask> {
            Ok(Mask::filled((5, 5), 1.0))
        }
    }

    let mut session = garment_mockup::MockupSession::new(
        MockupConfig::builder().mask_blur_radius(0.0).build()?,
        Arc::new(SmallMask),
        Arc::new(garment_mockup::NoPoseProvider),
    )?;
    session.select_photo(&dynamic(gradient_photo(50, 30))).await?;
    assert_eq!(session.garment_mask().unwrap().dimensions(), (50, 30));
    Ok(())
}

#[test]
fn test_mask_builder_boundaries() -> Result<()> {
    let segmentation = Mask::filled((1, 1), 1.0);
    let garment = GarmentMaskBuilder::build(&segmentation, None, 25.0)?;
    assert_eq!(garment.dimensions(), (1, 1));
    assert!(garment.mask().get(0, 0) > 0.99);

    assert!(GarmentMaskBuilder::build(&segmentation, None, f32::NAN).is_err());
    assert!(Mask::new(vec![0.0; 3], (2, 2)).is_err());
    Ok(())
}

#[test]
fn test_gallery_without_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let mut gallery = Gallery::load(temp_dir.path());
    assert!(gallery.is_empty());
    assert!(gallery.select_first().is_none());
    assert!(gallery.select(0).is_err());
}
