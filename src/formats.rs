//! Source format filter.

use std::path::Path;

/// Extensions accepted for conversion when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone)]
pub struct FormatFilter {
    extensions: Vec<String>,
}

impl Default for FormatFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl FormatFilter {
    /// Build a filter from extensions with or without a leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Check whether an extension such as `".JPG"` or `"png"` is supported.
    pub fn is_supported(&self, extension: &str) -> bool {
        let ext = normalize(extension);
        !ext.is_empty() && self.extensions.iter().any(|e| *e == ext)
    }

    /// Check the extension of a path.
    ///
    /// The extension is everything after the last dot of the file name, so a
    /// bare `.png` counts as a PNG.
    pub fn matches(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.is_supported(&ext))
            .unwrap_or(false)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

/// Check an extension against the default set.
pub fn is_supported(extension: &str) -> bool {
    DEFAULT_EXTENSIONS.contains(&normalize(extension).as_str())
}

fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    name.rfind('.').map(|dot| name[dot + 1..].to_string())
}

fn normalize(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}
