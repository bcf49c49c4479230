//! Article metadata from file paths.
//!
//! A [`PathSchema`] assigns a role to each trailing path segment. With the
//! default `[month, section, article]` schema, `2024-05/Partner Update/Q3.docx`
//! yields article `Q3`, section `Partner Update`, month `2024-05`.

use regex::Regex;
use tracing::trace;

use masterdoc_shared::{ArticleMeta, MasterDocError, PathsConfig, Result, SegmentRole};

/// Segment roles aligned to the end of a path, plus the separator set.
#[derive(Debug, Clone)]
pub struct PathSchema {
    roles: Vec<SegmentRole>,
    splitter: Regex,
}

impl PathSchema {
    /// Build a schema; the last role must be [`SegmentRole::Article`].
    pub fn new(roles: Vec<SegmentRole>, separators: &str) -> Result<Self> {
        if roles.last() != Some(&SegmentRole::Article) {
            return Err(MasterDocError::config(
                "path schema must end with the article role",
            ));
        }
        for role in [SegmentRole::Article, SegmentRole::Section] {
            if roles.iter().filter(|r| **r == role).count() != 1 {
                return Err(MasterDocError::config(format!(
                    "path schema must contain exactly one {role:?} role"
                )));
            }
        }
        if separators.is_empty() {
            return Err(MasterDocError::config("no path separators configured"));
        }

        let alternatives: Vec<String> = separators
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let splitter = Regex::new(&format!("(?:{})+", alternatives.join("|")))
            .map_err(|e| MasterDocError::config(format!("bad path separators: {e}")))?;

        Ok(Self { roles, splitter })
    }

    pub fn from_config(paths: &PathsConfig) -> Result<Self> {
        Self::new(paths.schema.clone(), &paths.separators)
    }

    /// Non-empty segments of `path`, with `.` segments dropped.
    pub fn segments<'a>(&self, path: &'a str) -> Vec<&'a str> {
        self.splitter
            .split(path)
            .filter(|s| !s.is_empty() && *s != ".")
            .collect()
    }

    /// Last segment of `path` (the file name), if any.
    pub fn file_name<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.segments(path).pop()
    }

    /// Derive article metadata from `path`. No filesystem access.
    ///
    /// Roles are matched from the file name backwards, and segments left of
    /// the schema are ignored. Whatever directory sits above the section
    /// fills the month role, so a month-less tree under an extra root (such
    /// as a scanned directory) needs `ignore` in place of `month`.
    pub fn parse(&self, path: &str) -> Result<ArticleMeta> {
        let segments = self.segments(path);
        let mut name = None;
        let mut section = None;
        let mut month = None;

        for (offset, role) in self.roles.iter().rev().enumerate() {
            let Some(index) = segments.len().checked_sub(offset + 1) else {
                break;
            };
            let segment = segments[index];
            match role {
                SegmentRole::Article => name = Some(strip_extension(segment)),
                SegmentRole::Section => section = Some(segment),
                SegmentRole::Month => month = Some(segment),
                SegmentRole::Ignore => {}
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| MasterDocError::invalid_path(path, "no article file name"))?;
        let section = section.ok_or_else(|| {
            MasterDocError::invalid_path(path, "path is too shallow to carry a section")
        })?;

        trace!(path, name, section, ?month, "path parsed");
        Ok(ArticleMeta {
            name: name.to_string(),
            section: section.to_string(),
            month: month.map(str::to_string),
        })
    }
}

/// A file name without its final extension (`a.b.docx` gives `a.b`).
/// Dot-files keep their name.
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    }
}
