//! Grouping of files by name similarity.
//!
//! Grouping runs in two phases:
//!
//! 1. Each name is reduced to a *base name* by stripping the extension,
//!    trailing counters, dates, long digit runs and version or backup
//!    suffixes. Base names shared by at least `min_group_size` files form a group.
//! 2. The remaining files are keyed by the first token of their name
//!    (`Prefixe_<token>`), or fall into the `Divers` bucket. Prefix groups
//!    smaller than `min_group_size` are dropped and their files left alone.
//!
//! Group order is the order in which each key was first seen, so a given
//! directory listing always yields the same groups in the same order.

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// Folder name used when a sanitized group name ends up empty.
pub const DEFAULT_GROUP_FOLDER: &str = "Groupe_Fichiers";

/// Catch-all bucket for names without a usable first token.
pub const MISC_GROUP: &str = "Divers";

/// Prefix prepended to first-token group keys.
pub const PREFIX_GROUP_TAG: &str = "Prefixe_";

/// Maximum length of a group folder name, in characters.
pub const MAX_FOLDER_NAME_LEN: usize = 50;

/// A named set of file names that will share one destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameGroup {
    pub key: String,
    pub files: Vec<String>,
}

/// Pre-compiled patterns for base-name extraction and grouping.
pub struct NameGrouper {
    trailing_number: Regex,
    dashed_date: Regex,
    compact_date: Regex,
    long_digits: Regex,
    version_suffix: Regex,
    separators: Regex,
    invalid_chars: Regex,
}

impl NameGrouper {
    pub fn new() -> Self {
        Self {
            trailing_number: compile(r"[-_\s]*\d+$"),
            dashed_date: compile(r"[-_\s]*\d{2,4}[-_]\d{1,2}[-_]\d{1,4}"),
            compact_date: compile(r"[-_\s]*\d{8}"),
            long_digits: compile(r"[-_\s]*\d{6,}"),
            version_suffix: compile(
                r"(?i)[-_\s]*(copy|copie|final|finale?|v\d+|version\d*|draft|brouillon|temp|tmp|backup|bak|old|ancien|nouveau|new)$",
            ),
            separators: compile(r"[-_\s]+"),
            invalid_chars: compile(r#"[<>:"/\\|?*]"#),
        }
    }

    /// Reduces a file name to the part shared by its versions and copies.
    ///
    /// Falls back to the bare stem when nothing is left.
    ///
    /// ```
    /// use dirsort::name_grouping::NameGrouper;
    ///
    /// let grouper = NameGrouper::new();
    /// assert_eq!(grouper.base_name("projectA_2.txt"), "projectA");
    /// assert_eq!(grouper.base_name("report 2024-03-15 final.pdf"), "report");
    /// assert_eq!(grouper.base_name("IMG_20230501.jpg"), "IMG");
    /// ```
    pub fn base_name(&self, file_name: &str) -> String {
        let stem = stem_of(file_name);

        let base = self.trailing_number.replace_all(&stem, "");
        let base = self.dashed_date.replace_all(&base, "");
        let base = self.compact_date.replace_all(&base, "");
        let base = self.long_digits.replace_all(&base, "");
        let base = self.version_suffix.replace_all(&base, "");
        let base = base.trim_matches(|c: char| matches!(c, '_' | '-' | '.' | ' '));

        if base.is_empty() {
            stem
        } else {
            base.to_string()
        }
    }

    /// Prefix key for a file left out of the base-name groups.
    pub fn prefix_key(&self, file_name: &str) -> String {
        let stem = stem_of(file_name);
        let tokens: Vec<&str> = self.separators.split(&stem).collect();
        match tokens.first() {
            Some(first) if tokens.len() > 1 && first.chars().count() > 2 => {
                format!("{}{}", PREFIX_GROUP_TAG, first)
            }
            _ => MISC_GROUP.to_string(),
        }
    }

    /// Groups file names by similarity. Files outside every returned group
    /// stay where they are.
    pub fn group(&self, file_names: &[String], min_group_size: usize) -> Vec<NameGroup> {
        let min_group_size = min_group_size.max(1);

        let mut by_base = OrderedGroups::default();
        for name in file_names {
            by_base.push(self.base_name(name), name.clone());
        }

        let mut result = OrderedGroups::default();
        let mut leftovers = Vec::new();
        for group in by_base.into_groups() {
            if group.files.len() >= min_group_size {
                result.extend(group);
            } else {
                leftovers.extend(group.files);
            }
        }

        let mut by_prefix = OrderedGroups::default();
        for name in leftovers {
            by_prefix.push(self.prefix_key(&name), name);
        }
        for group in by_prefix.into_groups() {
            if group.files.len() >= min_group_size {
                result.extend(group);
            }
        }

        result.into_groups()
    }

    /// Turns a group key into a safe folder name.
    ///
    /// Path-invalid characters become `_`, the name is cut to
    /// [`MAX_FOLDER_NAME_LEN`] characters and an empty result becomes
    /// [`DEFAULT_GROUP_FOLDER`].
    pub fn sanitize_folder_name(&self, name: &str) -> String {
        let replaced = self.invalid_chars.replace_all(name, "_");
        let truncated: String = replaced.chars().take(MAX_FOLDER_NAME_LEN).collect();
        let trimmed = truncated.trim();
        if trimmed.is_empty() {
            DEFAULT_GROUP_FOLDER.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for NameGrouper {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid built-in name pattern")
}

fn stem_of(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

/// Insertion-ordered multimap from group key to file names.
#[derive(Default)]
struct OrderedGroups {
    index: HashMap<String, usize>,
    groups: Vec<NameGroup>,
}

impl OrderedGroups {
    fn push(&mut self, key: String, file: String) {
        let slot = self.slot(key);
        self.groups[slot].files.push(file);
    }

    fn extend(&mut self, group: NameGroup) {
        let slot = self.slot(group.key);
        self.groups[slot].files.extend(group.files);
    }

    fn slot(&mut self, key: String) -> usize {
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.groups.len();
        self.index.insert(key.clone(), i);
        self.groups.push(NameGroup {
            key,
            files: Vec::new(),
        });
        i
    }

    fn into_groups(self) -> Vec<NameGroup> {
        self.groups
    }
}
