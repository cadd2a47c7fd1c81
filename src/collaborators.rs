//! Narrow interfaces to the collaborators the engine relies on but does not own.
//!
//! - [`CreationDateSource`] answers "when was this file created?" for the date
//!   classifier. The filesystem implementation prefers the birth time and falls
//!   back to the modification time on platforms that do not record it.
//! - [`KeywordExtractor`] returns up to five keywords for a file, most frequent
//!   first. Only plain-text files are understood here; richer document parsers
//!   plug in behind the same trait.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Provides the creation time of a file.
pub trait CreationDateSource {
    fn creation_date(&self, path: &Path) -> EngineResult<DateTime<Local>>;
}

/// Reads creation time from file metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCreationDate;

impl CreationDateSource for FsCreationDate {
    fn creation_date(&self, path: &Path) -> EngineResult<DateTime<Local>> {
        let metadata = fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        let time = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map_err(|e| EngineError::io(path, e))?;
        Ok(DateTime::<Local>::from(time))
    }
}

/// A fixed date for every file. Handy for simulations and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedCreationDate(pub DateTime<Local>);

impl CreationDateSource for FixedCreationDate {
    fn creation_date(&self, _path: &Path) -> EngineResult<DateTime<Local>> {
        Ok(self.0)
    }
}

/// Maximum number of keywords returned by an extractor.
pub const MAX_KEYWORDS: usize = 5;

/// Extracts the most significant words of a file's content.
pub trait KeywordExtractor {
    /// At most [`MAX_KEYWORDS`] words, most frequent first.
    fn extract_keywords(&self, path: &Path) -> EngineResult<Vec<String>>;
}

/// Keyword extraction for UTF-8 text files.
#[derive(Debug, Clone)]
pub struct PlainTextKeywords {
    stopwords: HashSet<&'static str>,
}

const STOPWORDS: &[&str] = &[
    // French
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "ou", "mais", "donc", "car", "ce",
    "cette", "ces", "dans", "sur", "avec", "pour", "par", "sans", "sous", "vers", "chez", "que",
    "qui", "quoi", "dont", "où", "quand", "comment", "pourquoi", "il", "elle", "ils", "elles",
    "je", "tu", "nous", "vous", "mon", "ma", "mes", "ton", "ta", "tes", "son", "sa", "ses",
    "notre", "votre", "leur", "leurs", "être", "avoir", "faire", "dire", "aller", "voir",
    "savoir", "pouvoir", "vouloir", "venir", "falloir", "devoir", "prendre", "donner", "mettre",
    // English
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "up", "about", "into", "through", "during", "before", "after", "above", "below",
    "between", "among", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can",
    "this", "that", "these", "those",
];

impl PlainTextKeywords {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Ranks the words of `content` by frequency.
    pub fn keywords_from_text(&self, content: &str) -> Vec<String> {
        let cleaned: String = content
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
            .collect();

        // Insertion order breaks frequency ties
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, word) in cleaned.split_whitespace().enumerate() {
            if word.chars().count() < 3
                || self.stopwords.contains(word)
                || word.chars().all(|c| c.is_ascii_digit())
            {
                continue;
            }
            counts.entry(word).or_insert((0, position)).0 += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .take(MAX_KEYWORDS)
            .map(|(word, _)| word.to_string())
            .collect()
    }
}

impl Default for PlainTextKeywords {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordExtractor for PlainTextKeywords {
    fn extract_keywords(&self, path: &Path) -> EngineResult<Vec<String>> {
        if !path.is_file() {
            return Err(EngineError::PathNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
        Ok(self.keywords_from_text(&String::from_utf8_lossy(&bytes)))
    }
}
