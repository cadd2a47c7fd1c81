//! Extension to category mapping used by the type classifier.
//!
//! Categories are plain folder names. The table is ordered: when an extension
//! is listed under several categories, the first category wins. Unknown
//! extensions fall back to the capitalized extension, and files without an
//! extension go to [`UNKNOWN_CATEGORY`].
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::CategoryTable;
//! use std::path::Path;
//!
//! let table = CategoryTable::default();
//! assert_eq!(table.category_for_path(Path::new("report.PDF")), "Documents");
//! assert_eq!(table.category_for_path(Path::new("scene.blend")), "Blend");
//! assert_eq!(table.category_for_path(Path::new("LICENSE")), "Autres");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Folder used for files that have no extension at all.
pub const UNKNOWN_CATEGORY: &str = "Autres";

/// One named category and the extensions it claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    /// Lowercase extensions including the leading dot, e.g. `".pdf"`.
    pub extensions: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Ordered extension → category lookup table.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
    extension_map: HashMap<String, usize>,
}

impl CategoryTable {
    /// Builds a table from rules in priority order.
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let mut table = Self {
            rules: Vec::new(),
            extension_map: HashMap::new(),
        };
        for rule in rules {
            table.add_rule(rule);
        }
        table
    }

    /// Appends a rule with the lowest priority. Extensions already claimed by
    /// an earlier rule keep their category.
    pub fn add_rule(&mut self, rule: CategoryRule) {
        let index = self.rules.len();
        for ext in &rule.extensions {
            self.extension_map.entry(normalize_extension(ext)).or_insert(index);
        }
        self.rules.push(rule);
    }

    /// Looks up the category for an extension, with or without leading dot.
    pub fn category_for_extension(&self, ext: &str) -> Option<&str> {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(|&i| self.rules[i].name.as_str())
    }

    /// Destination folder name for a file.
    pub fn category_for_path(&self, path: &Path) -> String {
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            return UNKNOWN_CATEGORY.to_string();
        };
        if ext.is_empty() {
            return UNKNOWN_CATEGORY.to_string();
        }

        match self.category_for_extension(&ext) {
            Some(category) => category.to_string(),
            None => capitalize(&ext),
        }
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// The built-in category table.
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Documents",
            &[".pdf", ".doc", ".docx", ".txt", ".odt", ".rtf", ".md"],
        ),
        CategoryRule::new(
            "Images",
            &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".tiff", ".webp"],
        ),
        CategoryRule::new(
            "Vidéos",
            &[".mp4", ".avi", ".mov", ".mkv", ".wmv", ".flv", ".webm", ".m4v"],
        ),
        CategoryRule::new(
            "Musique",
            &[".mp3", ".wav", ".aac", ".flac", ".ogg", ".m4a"],
        ),
        CategoryRule::new(
            "Archives",
            &[".zip", ".rar", ".tar", ".gz", ".7z", ".iso"],
        ),
        CategoryRule::new(
            "Exécutables",
            &[".exe", ".msi", ".bat", ".sh", ".apk", ".appx", ".app", ".deb", ".rpm"],
        ),
        CategoryRule::new(
            "Feuilles de calcul",
            &[".xls", ".xlsx", ".csv", ".ods", ".numbers"],
        ),
        CategoryRule::new("Présentations", &[".ppt", ".pptx", ".odp", ".key"]),
        CategoryRule::new(
            "Code",
            &[
                ".py", ".java", ".c", ".cpp", ".js", ".html", ".css", ".php", ".rb", ".go", ".ts",
            ],
        ),
        CategoryRule::new(
            "Base de données",
            &[".db", ".sqlite", ".mdb", ".accdb", ".sql"],
        ),
        CategoryRule::new("Ebooks", &[".epub", ".mobi", ".azw", ".fb2"]),
        CategoryRule::new(
            "Design",
            &[".psd", ".ai", ".xd", ".sketch", ".figma", ".xcf"],
        ),
        CategoryRule::new("Polices", &[".ttf", ".otf", ".woff", ".woff2"]),
    ]
}

/// Uppercases the first character and lowercases the rest.
///
/// ```
/// assert_eq!(dirsort::file_category::capitalize("projectA"), "Projecta");
/// assert_eq!(dirsort::file_category::capitalize("PDF"), "Pdf");
/// ```
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn normalize_extension(ext: &str) -> String {
    let lower = ext.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}
