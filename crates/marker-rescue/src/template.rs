//! Template store: per-marker reference images with precomputed features.

use marker_rescue_core::{GrayImage, Quad};
use marker_rescue_features::{FeatureExtractor, FeatureSet};
use nalgebra::Point2;
use std::collections::HashMap;
#[cfg(feature = "image")]
use std::path::Path;

/// Reference appearance of one marker.
///
/// Features are extracted once when the template enters the store and reused
/// on every re-acquire attempt; only the live frame is re-extracted per
/// attempt.
#[derive(Clone, Debug)]
pub struct MarkerTemplate {
    pub marker_id: u32,
    pub image: GrayImage,
    pub features: FeatureSet,
    /// The template's own image corners (TL, TR, BR, BL).
    pub corners: Quad,
}

/// Immutable-after-build collection of marker templates.
#[derive(Default)]
pub struct TemplateStore {
    templates: HashMap<u32, MarkerTemplate>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template from an in-memory grayscale image.
    pub fn insert_image(&mut self, marker_id: u32, image: GrayImage, extractor: &FeatureExtractor) {
        let features = extractor.extract(&image.as_view());
        let (w, h) = (image.width as f32, image.height as f32);
        let corners = Quad([
            Point2::new(0.0, 0.0),
            Point2::new(w - 1.0, 0.0),
            Point2::new(w - 1.0, h - 1.0),
            Point2::new(0.0, h - 1.0),
        ]);
        log::info!(
            "template for marker {marker_id}: {} keypoints cached",
            features.len()
        );
        self.templates.insert(
            marker_id,
            MarkerTemplate {
                marker_id,
                image,
                features,
                corners,
            },
        );
    }

    #[inline]
    pub fn get(&self, marker_id: u32) -> Option<&MarkerTemplate> {
        self.templates.get(&marker_id)
    }

    #[inline]
    pub fn contains(&self, marker_id: u32) -> bool {
        self.templates.contains_key(&marker_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load every `id_<ID>.<ext>` template below `dir`.
    ///
    /// A missing directory, an unparsable file name or an undecodable image
    /// only costs that marker its re-acquire capability; nothing here is
    /// fatal.
    #[cfg(feature = "image")]
    pub fn load_dir(dir: impl AsRef<Path>, extractor: &FeatureExtractor) -> Self {
        let dir = dir.as_ref();
        let mut store = Self::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!(
                    "template directory {} not readable ({err}); markers cannot be re-acquired",
                    dir.display()
                );
                return store;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(marker_id) = parse_template_id(&path) else {
                log::warn!("ignoring template with unexpected name: {}", path.display());
                continue;
            };
            let gray = match ::image::open(&path) {
                Ok(img) => img.to_luma8(),
                Err(err) => {
                    log::warn!("failed to load template {}: {err}", path.display());
                    continue;
                }
            };
            let core_gray = GrayImage {
                width: gray.width() as usize,
                height: gray.height() as usize,
                data: gray.into_raw(),
            };
            store.insert_image(marker_id, core_gray, extractor);
        }

        log::info!(
            "loaded {} marker templates from {}",
            store.len(),
            dir.display()
        );
        store
    }
}

/// `id_<ID>` stem with any image extension.
#[cfg(feature = "image")]
fn parse_template_id(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix("id_")?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_rescue_features::FeatureParams;

    fn textured(w: usize, h: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let v = (x / 4).wrapping_mul(2654435761) ^ (y / 4).wrapping_mul(40503);
            (v % 251) as u8
        })
    }

    #[test]
    fn insert_caches_features_and_corners() {
        let extractor = FeatureExtractor::new(FeatureParams::default());
        let mut store = TemplateStore::new();
        store.insert_image(5, textured(96, 80), &extractor);

        let tpl = store.get(5).expect("template");
        assert!(!tpl.features.is_empty());
        assert_eq!(tpl.corners.points()[2], Point2::new(95.0, 79.0));
        assert!(!store.contains(6));
    }

    #[cfg(feature = "image")]
    mod disk {
        use super::*;

        fn write_png(path: &std::path::Path, img: &GrayImage) {
            let buf = ::image::GrayImage::from_raw(
                img.width as u32,
                img.height as u32,
                img.data.clone(),
            )
            .expect("buffer");
            buf.save(path).expect("save png");
        }

        #[test]
        fn loads_templates_by_naming_convention() {
            let dir = tempfile::tempdir().expect("tempdir");
            let extractor = FeatureExtractor::new(FeatureParams::default());

            write_png(&dir.path().join("id_3.png"), &textured(64, 64));
            write_png(&dir.path().join("id_11.png"), &textured(64, 64));
            write_png(&dir.path().join("notes.png"), &textured(64, 64));

            let store = TemplateStore::load_dir(dir.path(), &extractor);
            assert_eq!(store.len(), 2);
            assert!(store.contains(3));
            assert!(store.contains(11));
        }

        #[test]
        fn missing_directory_is_empty_not_fatal() {
            let extractor = FeatureExtractor::new(FeatureParams::default());
            let store = TemplateStore::load_dir("definitely/not/here", &extractor);
            assert!(store.is_empty());
        }
    }
}
