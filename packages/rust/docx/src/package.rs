//! OPC package container: the zip archive behind every `.docx` file, plus
//! its `[Content_Types].xml` table.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use masterdoc_shared::{MasterDocError, Result};

use crate::xml::{self, escape};

/// Name of the content types part.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Largest part accepted when reading a package.
const MAX_PART_BYTES: u64 = 512 * 1024 * 1024;

/// Upper bound on the buffer reserved from a zip entry's declared size.
const PREALLOC_CAP: u64 = 4 * 1024 * 1024;

/// Read one zip entry. The declared size only sizes the initial buffer;
/// the actual bytes read are bounded by `limit`.
fn read_part(reader: impl Read, declared: u64, name: &str, limit: u64) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(declared.min(PREALLOC_CAP) as usize);
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| MasterDocError::document(format!("cannot read {name}: {e}")))?;
    if data.len() as u64 > limit {
        return Err(MasterDocError::document(format!(
            "part {name} is larger than {limit} bytes"
        )));
    }
    Ok(data)
}

/// All parts of a package, keyed by zip entry name (no leading slash).
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Read a package from raw `.docx` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| MasterDocError::document(format!("not a zip package: {e}")))?;

        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| MasterDocError::document(format!("bad zip entry {i}: {e}")))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let declared = file.size();
            let data = read_part(&mut file, declared, &name, MAX_PART_BYTES)?;
            parts.insert(name, data);
        }

        if !parts.contains_key(CONTENT_TYPES_PART) {
            return Err(MasterDocError::document("package has no [Content_Types].xml"));
        }

        debug!(parts = parts.len(), "package read");
        Ok(Self { parts })
    }

    /// Read a package from a file on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| MasterDocError::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the package to zip bytes. `[Content_Types].xml` is written first.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opt = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name.as_str() == CONTENT_TYPES_PART)
            .chain(
                self.parts
                    .iter()
                    .filter(|(name, _)| name.as_str() != CONTENT_TYPES_PART),
            );

        for (name, data) in ordered {
            zip.start_file(name.as_str(), opt)
                .map_err(|e| MasterDocError::document(format!("cannot add {name}: {e}")))?;
            zip.write_all(data)
                .map_err(|e| MasterDocError::document(format!("cannot write {name}: {e}")))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| MasterDocError::document(format!("cannot finish zip: {e}")))?;
        Ok(cursor.into_inner())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// A part decoded as UTF-8 text.
    pub fn part_str(&self, name: &str) -> Result<Option<String>> {
        match self.parts.get(name) {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes.clone())
                .map(Some)
                .map_err(|e| MasterDocError::document(format!("{name} is not UTF-8: {e}"))),
        }
    }

    pub fn set_part(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.parts.insert(name.into(), data);
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// First free part name of the form `<dir>/<stem><n>.<ext>`.
    pub fn unique_part_name(&self, dir: &str, stem: &str, ext: &str) -> String {
        (1..)
            .map(|n| format!("{dir}/{stem}{n}.{ext}"))
            .find(|candidate| !self.parts.contains_key(candidate))
            .unwrap_or_else(|| format!("{dir}/{stem}.{ext}"))
    }

    /// Parsed `[Content_Types].xml`.
    pub fn content_types(&self) -> Result<ContentTypes> {
        let xml = self
            .part_str(CONTENT_TYPES_PART)?
            .ok_or_else(|| MasterDocError::document("package has no [Content_Types].xml"))?;
        ContentTypes::parse(&xml)
    }

    pub fn set_content_types(&mut self, types: &ContentTypes) {
        self.set_part(CONTENT_TYPES_PART, types.to_xml().into_bytes());
    }
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// `[Content_Types].xml`: extension defaults and per-part overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// `(extension, content type)`, extension lowercase without dot.
    pub defaults: Vec<(String, String)>,
    /// `(part name with leading slash, content type)`.
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml_text: &str) -> Result<Self> {
        let mut types = Self::default();
        let mut bad = None;
        xml::visit_elements(xml_text, |name, attrs| match name {
            "Default" => match (xml::attr(attrs, "Extension"), xml::attr(attrs, "ContentType")) {
                (Some(ext), Some(ct)) => types
                    .defaults
                    .push((ext.to_ascii_lowercase(), ct.to_string())),
                _ => bad = Some("Default"),
            },
            "Override" => match (xml::attr(attrs, "PartName"), xml::attr(attrs, "ContentType")) {
                (Some(part), Some(ct)) => types.overrides.push((part.to_string(), ct.to_string())),
                _ => bad = Some("Override"),
            },
            _ => {}
        })?;
        if let Some(elem) = bad {
            return Err(MasterDocError::document(format!(
                "content types <{elem}> is missing attributes"
            )));
        }
        Ok(types)
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        );
        for (ext, ct) in &self.defaults {
            out.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape(ext),
                escape(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            out.push_str(&format!(
                "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                escape(part),
                escape(ct)
            ));
        }
        out.push_str("</Types>");
        out
    }

    pub fn default_for(&self, ext: &str) -> Option<&str> {
        let ext = ext.to_ascii_lowercase();
        self.defaults
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, ct)| ct.as_str())
    }

    /// Override for a part name given without leading slash.
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let key = format!("/{part}");
        self.overrides
            .iter()
            .find(|(p, _)| *p == key)
            .map(|(_, ct)| ct.as_str())
    }

    /// Content type a part resolves to (override first, then extension default).
    pub fn resolve(&self, part: &str) -> Option<&str> {
        self.override_for(part).or_else(|| {
            part.rsplit_once('.')
                .and_then(|(_, ext)| self.default_for(ext))
        })
    }

    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if self.default_for(ext).is_none() {
            self.defaults
                .push((ext.to_ascii_lowercase(), content_type.to_string()));
        }
    }

    /// Set the override for a part name given without leading slash.
    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let key = format!("/{part}");
        match self.overrides.iter_mut().find(|(p, _)| *p == key) {
            Some(slot) => slot.1 = content_type.to_string(),
            None => self.overrides.push((key, content_type.to_string())),
        }
    }
}

/// Content type for common image extensions.
pub fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
