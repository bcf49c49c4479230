//! Application configuration for masterdoc.
//!
//! User config lives at `~/.masterdoc/masterdoc.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MasterDocError, Result};
use crate::types::SegmentRole;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "masterdoc.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".masterdoc";

// ---------------------------------------------------------------------------
// Config structs (matching masterdoc.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Section ordering and naming.
    #[serde(default)]
    pub sections: SectionsConfig,

    /// How article and summary paths are interpreted.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Section banner images.
    #[serde(default)]
    pub banners: BannerConfig,

    /// Fonts, sizes, and colors of the generated styles.
    #[serde(default)]
    pub typography: TypographyConfig,

    /// Master document output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[sections]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionsConfig {
    /// Recognized section names in priority order.
    #[serde(default = "default_section_order")]
    pub order: Vec<String>,

    /// Label of the catch-all category for uncategorized articles.
    #[serde(default = "default_catch_all")]
    pub catch_all: String,

    /// Optional heading text per section (defaults to the section name).
    #[serde(default)]
    pub display_names: BTreeMap<String, String>,
}

impl Default for SectionsConfig {
    fn default() -> Self {
        Self {
            order: default_section_order(),
            catch_all: default_catch_all(),
            display_names: BTreeMap::new(),
        }
    }
}

fn default_section_order() -> Vec<String> {
    [
        "Content + Training",
        "Product + Availability",
        "Programs + Offers",
        "Partner Update",
        "nocat",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_catch_all() -> String {
    "nocat".into()
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Segment roles, aligned to the end of each document path.
    #[serde(default = "default_schema")]
    pub schema: Vec<SegmentRole>,

    /// Characters treated as path separators.
    #[serde(default = "default_separators")]
    pub separators: String,

    /// Suffix stripped from summary file stems before pairing.
    #[serde(default = "default_summary_suffix")]
    pub summary_suffix: String,

    /// Extensions recognized as article documents during directory scans.
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,

    /// Extensions recognized as summaries during directory scans.
    #[serde(default = "default_summary_extensions")]
    pub summary_extensions: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            separators: default_separators(),
            summary_suffix: default_summary_suffix(),
            document_extensions: default_document_extensions(),
            summary_extensions: default_summary_extensions(),
        }
    }
}

fn default_schema() -> Vec<SegmentRole> {
    vec![SegmentRole::Month, SegmentRole::Section, SegmentRole::Article]
}
fn default_separators() -> String {
    "/\\".into()
}
fn default_summary_suffix() -> String {
    "_summary".into()
}
fn default_document_extensions() -> Vec<String> {
    vec!["docx".into()]
}
fn default_summary_extensions() -> Vec<String> {
    vec!["txt".into()]
}

/// `[banners]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannerConfig {
    /// Image used for sections without their own entry.
    #[serde(default = "default_banner")]
    pub default: String,

    /// Section name to image path (exact match).
    #[serde(default)]
    pub images: BTreeMap<String, String>,

    /// Rendered banner width in inches.
    #[serde(default = "default_banner_width")]
    pub width_in: f64,

    /// Rendered banner height in inches.
    #[serde(default = "default_banner_height")]
    pub height_in: f64,

    /// Left indent of the banner paragraph in twips (negative bleeds into the margin).
    #[serde(default = "default_banner_indent")]
    pub indent_twips: i32,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            default: default_banner(),
            images: BTreeMap::new(),
            width_in: default_banner_width(),
            height_in: default_banner_height(),
            indent_twips: default_banner_indent(),
        }
    }
}

fn default_banner() -> String {
    "banners/default.png".into()
}
fn default_banner_width() -> f64 {
    10.0
}
fn default_banner_height() -> f64 {
    1.25
}
fn default_banner_indent() -> i32 {
    -1080
}

/// `[typography]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypographyConfig {
    /// Font family for body text.
    #[serde(default = "default_regular_font")]
    pub regular_font: String,

    /// Font family for headings and labels.
    #[serde(default = "default_semibold_font")]
    pub semibold_font: String,

    /// Heading size in points.
    #[serde(default = "default_heading_size")]
    pub heading_size_pt: f32,

    /// Body and label size in points.
    #[serde(default = "default_body_size")]
    pub body_size_pt: f32,

    /// Hex RGB color of body text, labels, and article headings.
    #[serde(default = "default_color")]
    pub text_color: String,

    /// Hex RGB color of section headings.
    #[serde(default = "default_color")]
    pub section_color: String,
}

impl Default for TypographyConfig {
    fn default() -> Self {
        Self {
            regular_font: default_regular_font(),
            semibold_font: default_semibold_font(),
            heading_size_pt: default_heading_size(),
            body_size_pt: default_body_size(),
            text_color: default_color(),
            section_color: default_color(),
        }
    }
}

fn default_regular_font() -> String {
    "Segoe UI".into()
}
fn default_semibold_font() -> String {
    "Segoe UI Semibold".into()
}
fn default_heading_size() -> f32 {
    12.0
}
fn default_body_size() -> f32 {
    11.0
}
fn default_color() -> String {
    "000000".into()
}

/// How the composer resolves a style id defined by more than one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleConflict {
    /// The first document's definition is kept.
    #[default]
    KeepFirst,
    /// The last appended definition replaces earlier ones.
    LastWins,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output file name.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Optional title paragraph placed before the TOC field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc_title: Option<String>,

    /// Insert a page break after the TOC.
    #[serde(default = "default_true")]
    pub toc_page_break: bool,

    /// Force every page section to landscape.
    #[serde(default = "default_true")]
    pub landscape: bool,

    /// Style collision policy used while composing.
    #[serde(default)]
    pub style_conflict: StyleConflict,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            toc_title: None,
            toc_page_break: true,
            landscape: true,
            style_conflict: StyleConflict::default(),
        }
    }
}

fn default_file_name() -> String {
    "master_doc.docx".into()
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Check internal consistency of the loaded configuration.
    pub fn validate(&self) -> Result<()> {
        let schema = &self.paths.schema;
        if schema.last() != Some(&SegmentRole::Article) {
            return Err(MasterDocError::config(
                "paths.schema must end with the \"article\" role",
            ));
        }
        for role in [SegmentRole::Article, SegmentRole::Section] {
            let count = schema.iter().filter(|r| **r == role).count();
            if count != 1 {
                return Err(MasterDocError::config(format!(
                    "paths.schema must contain exactly one {role:?} role, found {count}"
                )));
            }
        }
        if schema.iter().filter(|r| **r == SegmentRole::Month).count() > 1 {
            return Err(MasterDocError::config(
                "paths.schema may contain at most one month role",
            ));
        }
        if self.paths.separators.is_empty() {
            return Err(MasterDocError::config("paths.separators must not be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.sections.order {
            if !seen.insert(name.as_str()) {
                return Err(MasterDocError::config(format!(
                    "section {name:?} appears twice in sections.order"
                )));
            }
        }

        if self.banners.width_in <= 0.0 || self.banners.height_in <= 0.0 {
            return Err(MasterDocError::config("banner dimensions must be positive"));
        }

        let typo = &self.typography;
        if typo.heading_size_pt <= 0.0 || typo.body_size_pt <= 0.0 {
            return Err(MasterDocError::config("font sizes must be positive"));
        }
        for color in [&typo.text_color, &typo.section_color] {
            if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(MasterDocError::config(format!(
                    "color {color:?} is not a 6-digit hex RGB value"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.masterdoc/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MasterDocError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.masterdoc/masterdoc.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MasterDocError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        MasterDocError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MasterDocError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MasterDocError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MasterDocError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
