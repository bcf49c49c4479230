//! Section banner images.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use masterdoc_docx::image_content_type;
use masterdoc_shared::{BannerConfig, MasterDocError, Result};

/// Image bytes plus what is needed to embed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerImage {
    pub bytes: Vec<u8>,
    /// Lowercase file extension (`png`, `jpg`, ...).
    pub extension: String,
    pub source: PathBuf,
}

impl BannerImage {
    /// Read an image file; the extension must be a known image type.
    pub fn read(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if image_content_type(&extension).is_none() {
            return Err(MasterDocError::validation(format!(
                "banner {} is not a supported image type",
                path.display()
            )));
        }
        let bytes = std::fs::read(path).map_err(|e| MasterDocError::io(path, e))?;
        Ok(Self {
            bytes,
            extension,
            source: path.to_path_buf(),
        })
    }

    /// File stem used as the picture name inside the document.
    pub fn name(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "banner".to_string())
    }
}

/// Section to banner lookup with a default, loaded once per run.
#[derive(Debug, Clone)]
pub struct BannerSet {
    default: BannerImage,
    by_section: BTreeMap<String, BannerImage>,
    pub width_in: f64,
    pub height_in: f64,
    pub indent_twips: i32,
}

impl BannerSet {
    /// Read every configured image. Relative paths resolve against `base_dir`.
    #[instrument(skip_all, fields(sections = config.images.len()))]
    pub fn load(config: &BannerConfig, base_dir: &Path) -> Result<Self> {
        let resolve = |p: &str| {
            let path = PathBuf::from(p);
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };

        let default = BannerImage::read(&resolve(&config.default))?;
        let mut by_section = BTreeMap::new();
        for (section, image) in &config.images {
            by_section.insert(section.clone(), BannerImage::read(&resolve(image))?);
        }
        debug!(images = by_section.len() + 1, "banners loaded");
        Ok(Self::from_images(default, by_section, config))
    }

    /// Build from already-loaded images, taking geometry from `config`.
    pub fn from_images(
        default: BannerImage,
        by_section: BTreeMap<String, BannerImage>,
        config: &BannerConfig,
    ) -> Self {
        Self {
            default,
            by_section,
            width_in: config.width_in,
            height_in: config.height_in,
            indent_twips: config.indent_twips,
        }
    }

    /// Exact-match lookup by section name; the default image otherwise.
    pub fn lookup(&self, section: &str) -> &BannerImage {
        self.by_section.get(section).unwrap_or(&self.default)
    }
}
