//! Model photo gallery
//!
//! The gallery is seeded from a `models.json` manifest (`{"models": [...]}`)
//! whose entries are file names relative to the manifest's directory. A
//! missing or unreadable manifest is not fatal: the gallery just starts empty.
//! Uploaded photos are appended for the rest of the session.

use crate::{
    error::{MockupError, Result},
    services::ImageIOService,
};
use image::DynamicImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Manifest file name looked up inside a gallery directory
pub const MANIFEST_FILE_NAME: &str = "models.json";

#[derive(Debug, Deserialize)]
struct Manifest {
    models: Vec<String>,
}

/// Where a gallery entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    Manifest,
    Upload,
}

/// One selectable model photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryEntry {
    /// File name shown to the user
    pub title: String,
    pub path: PathBuf,
    pub source: EntrySource,
}

impl GalleryEntry {
    fn new(path: PathBuf, source: EntrySource) -> Self {
        let title = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        Self { title, path, source }
    }
}

/// Ordered list of model photos with the current selection
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
    selected: Option<usize>,
}

impl Gallery {
    /// Load `models.json` from a gallery directory
    ///
    /// Failures are logged and yield an empty gallery.
    #[must_use]
    pub fn load<P: AsRef<Path>>(dir: P) -> Self {
        Self::load_manifest(dir.as_ref().join(MANIFEST_FILE_NAME))
    }

    /// Load a manifest file; entries resolve relative to its directory
    #[must_use]
    pub fn load_manifest<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let result = std::fs::read_to_string(path)
            .map_err(|e| MockupError::file_io_error("read gallery manifest", path, &e))
            .and_then(|text| Self::from_manifest_str(&text, base_dir));

        match result {
            Ok(gallery) => {
                log::info!("Loaded {} gallery entries from {}", gallery.len(), path.display());
                gallery
            },
            Err(e) => {
                log::warn!("No usable gallery manifest, starting empty: {}", e);
                Self::default()
            },
        }
    }

    /// Parse manifest JSON with entries relative to `base_dir`
    ///
    /// # Errors
    /// - The JSON is malformed or lacks a `models` array
    pub fn from_manifest_str(json: &str, base_dir: &Path) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let entries = manifest
            .models
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| GalleryEntry::new(base_dir.join(name), EntrySource::Manifest))
            .collect();
        Ok(Self {
            entries,
            selected: None,
        })
    }

    #[must_use]
    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn selected(&self) -> Option<&GalleryEntry> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    /// Mark an entry as selected
    ///
    /// # Errors
    /// - `index` is out of range
    pub fn select(&mut self, index: usize) -> Result<&GalleryEntry> {
        if index >= self.entries.len() {
            return Err(MockupError::invalid_config(format!(
                "Gallery index {index} out of range (0-{})",
                self.entries.len().saturating_sub(1)
            )));
        }
        self.selected = Some(index);
        self.entries
            .get(index)
            .ok_or_else(|| MockupError::processing("Gallery entry vanished"))
    }

    /// Select the first entry, if any
    pub fn select_first(&mut self) -> Option<&GalleryEntry> {
        self.select(0).ok()
    }

    /// Append uploaded photos and select the last one
    ///
    /// Every upload is decoded first; if any fails, nothing is added.
    ///
    /// # Errors
    /// - An upload is missing or not a decodable image
    pub fn add_uploads<I, P>(&mut self, paths: I) -> Result<Option<&GalleryEntry>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        for path in &paths {
            ImageIOService::load_image(path)?;
        }
        if paths.is_empty() {
            return Ok(None);
        }

        self.entries
            .extend(paths.into_iter().map(|path| GalleryEntry::new(path, EntrySource::Upload)));
        let last = self.entries.len() - 1;
        self.select(last).map(Some)
    }

    /// Decode the selected photo
    ///
    /// # Errors
    /// - Nothing is selected
    /// - The file cannot be decoded
    pub fn load_selected_image(&self) -> Result<DynamicImage> {
        let entry = self.selected().ok_or(MockupError::NoBaseImage)?;
        ImageIOService::load_image(&entry.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    fn write_photo(path: &Path) {
        RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])).save(path).unwrap();
    }

    #[test]
    fn test_manifest_entries_resolve_relative() {
        let gallery =
            Gallery::from_manifest_str(r#"{"models": ["model1.jpg", "sub/model2.png", ""]}"#, Path::new("/srv/models"))
                .unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.entries()[0].path, Path::new("/srv/models/model1.jpg"));
        assert_eq!(gallery.entries()[1].title, "model2.png");
        assert!(gallery.selected().is_none());
    }

    #[test]
    fn test_missing_or_bad_manifest_is_empty() {
        let dir = tempdir().unwrap();
        assert!(Gallery::load(dir.path()).is_empty());

        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), "{\"photos\": []}").unwrap();
        assert!(Gallery::load(dir.path()).is_empty());
    }

    #[test]
    fn test_select_first_and_bounds() {
        let mut gallery = Gallery::from_manifest_str(r#"{"models": ["a.png", "b.png"]}"#, Path::new(".")).unwrap();
        assert_eq!(gallery.select_first().unwrap().title, "a.png");
        assert_eq!(gallery.selected_index(), Some(0));
        assert!(gallery.select(5).is_err());
        assert_eq!(gallery.selected_index(), Some(0));

        let mut empty = Gallery::default();
        assert!(empty.select_first().is_none());
        assert!(matches!(empty.load_selected_image(), Err(MockupError::NoBaseImage)));
    }

    #[test]
    fn test_uploads_append_and_select_last() {
        let dir = tempdir().unwrap();
        write_photo(&dir.path().join("model1.png"));
        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), r#"{"models": ["model1.png"]}"#).unwrap();

        let mut gallery = Gallery::load(dir.path());
        gallery.select_first();

        let up1 = dir.path().join("upload1.png");
        let up2 = dir.path().join("upload2.png");
        write_photo(&up1);
        write_photo(&up2);

        let selected = gallery.add_uploads([&up1, &up2]).unwrap().unwrap();
        assert_eq!(selected.path, up2);
        assert_eq!(selected.source, EntrySource::Upload);
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.selected_index(), Some(2));
        assert!(gallery.load_selected_image().is_ok());
    }

    #[test]
    fn test_undecodable_upload_leaves_gallery_unchanged() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.png");
        write_photo(&good);
        std::fs::write(&bad, b"not a png").unwrap();

        let mut gallery = Gallery::default();
        assert!(gallery.add_uploads([&good, &bad]).is_err());
        assert!(gallery.is_empty());
        assert!(gallery.selected().is_none());
        assert!(gallery.add_uploads(Vec::<PathBuf>::new()).unwrap().is_none());
    }
}
