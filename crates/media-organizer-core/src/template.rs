//! Destination path templates.
//!
//! A pattern is a `/`- or `\`-separated list of segments mixing literal text
//! with `%`-tokens that are filled from a record's tags:
//!
//! | Token | Value                                    | Required |
//! |-------|------------------------------------------|----------|
//! | `%i`  | Zero-based index assigned by preload     | yes      |
//! | `%y`  | Four-digit year                          | yes      |
//! | `%m`  | Two-digit month number                   | yes      |
//! | `%M`  | Month name (`July`)                      | yes      |
//! | `%d`  | Two-digit day of month                   | yes      |
//! | `%D`  | Day name (`Wednesday`)                   | yes      |
//! | `%n`  | File name without extension              | yes      |
//! | `%o`  | Original file name without extension     | yes      |
//! | `%e`  | Extension of the source file             | no       |
//! | `%t`  | The record's tag list joined with `", "` | no       |
//! | `%c`  | Camera model                             | no       |
//!
//! Date tokens read `Timestamp`, then `DateCreated`, then `DateModified`.
//! `%%` is a literal `%`; a `%` before any other letter is kept as text.
//! An optional token without a value removes its whole segment, a required
//! one fails the resolution with [`Error::MissingTag`].
//!
//! ```
//! use media_organizer_core::template::{PathPattern, PatternIndex};
//!
//! let pattern: PathPattern = "%y/%M/%n".parse().unwrap();
//! assert!(!pattern.uses_extension());
//! # let _ = PatternIndex::default();
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};

use crate::error::{Error, Result};
use crate::types::{MetaData, TagKey, Tags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Index,
    Year,
    MonthNumber,
    MonthName,
    DayNumber,
    DayName,
    Stem,
    OriginalStem,
    Extension,
    TagList,
    Camera,
}

impl Token {
    fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'i' => Self::Index,
            'y' => Self::Year,
            'm' => Self::MonthNumber,
            'M' => Self::MonthName,
            'd' => Self::DayNumber,
            'D' => Self::DayName,
            'n' => Self::Stem,
            'o' => Self::OriginalStem,
            'e' => Self::Extension,
            't' => Self::TagList,
            'c' => Self::Camera,
            _ => return None,
        })
    }

    fn letter(self) -> char {
        match self {
            Self::Index => 'i',
            Self::Year => 'y',
            Self::MonthNumber => 'm',
            Self::MonthName => 'M',
            Self::DayNumber => 'd',
            Self::DayName => 'D',
            Self::Stem => 'n',
            Self::OriginalStem => 'o',
            Self::Extension => 'e',
            Self::TagList => 't',
            Self::Camera => 'c',
        }
    }

    fn missing(self, key: &str) -> Error {
        Error::MissingTag {
            token: self.letter(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Token(Token),
}

/// Preload state of one organize run
///
/// Maps every preloaded record path to its index (files with tags only) and
/// every index to the record's joined tag list.
#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    indices: HashMap<PathBuf, Option<usize>>,
    tag_lists: Vec<String>,
}

impl PatternIndex {
    /// Assign indices in traversal order, starting at 0
    pub fn preload(records: &[MetaData]) -> Self {
        let mut index = Self::default();
        for record in records {
            let assigned = match record.tags() {
                Some(tags) if !record.is_directory() => {
                    index.tag_lists.push(joined_tag_list(tags));
                    Some(index.tag_lists.len() - 1)
                }
                _ => None,
            };
            index.indices.insert(record.path().to_path_buf(), assigned);
        }
        index
    }

    /// Index of the record at `path`; the outer `None` means it was not preloaded
    pub fn index_of(&self, path: &Path) -> Option<Option<usize>> {
        self.indices.get(path).copied()
    }

    pub fn tag_list(&self, index: usize) -> Option<&str> {
        self.tag_lists.get(index).map(String::as_str)
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.tag_lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag_lists.is_empty()
    }
}

fn joined_tag_list(tags: &Tags) -> String {
    match tags.list(TagKey::Tags) {
        Some(items) => items.join(", "),
        None => tags.text(TagKey::Tags).unwrap_or_default(),
    }
}

/// Compiled destination pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Vec<Piece>>,
}

impl FromStr for PathPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<Vec<Piece>> = s
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .map(parse_segment)
            .collect();
        if segments.is_empty() {
            return Err(Error::Configuration(format!(
                "path pattern '{}' has no segments",
                s
            )));
        }
        Ok(Self {
            source: s.to_string(),
            segments,
        })
    }
}

fn parse_segment(segment: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                literal.push('%');
            }
            Some(letter) => match Token::from_letter(letter) {
                Some(token) => {
                    chars.next();
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Token(token));
                }
                None => literal.push('%'),
            },
            None => literal.push('%'),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

impl PathPattern {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern places the extension itself
    pub fn uses_extension(&self) -> bool {
        self.segments
            .iter()
            .flatten()
            .any(|piece| *piece == Piece::Token(Token::Extension))
    }

    /// Build the destination of `record` under `destination_root`
    pub fn resolve(
        &self,
        index: &PatternIndex,
        destination_root: &Path,
        record: &MetaData,
    ) -> Result<PathBuf> {
        let position = index
            .index_of(record.path())
            .ok_or_else(|| Error::NotPreloaded(record.path().to_path_buf()))?;
        let empty = Tags::new();
        let context = Context {
            index,
            position,
            record,
            tags: record.tags().unwrap_or(&empty),
        };

        let mut path = destination_root.to_path_buf();
        for segment in &self.segments {
            if let Some(component) = context.segment(segment)? {
                path.push(component);
            }
        }
        Ok(path)
    }
}

struct Context<'a> {
    index: &'a PatternIndex,
    position: Option<usize>,
    record: &'a MetaData,
    tags: &'a Tags,
}

impl Context<'_> {
    /// Resolved and sanitized component, `None` when the segment drops out
    fn segment(&self, pieces: &[Piece]) -> Result<Option<String>> {
        let mut out = String::new();
        for piece in pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Token(token) => match self.value(*token)? {
                    Some(value) => out.push_str(&value),
                    None => return Ok(None),
                },
            }
        }
        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(sanitize_component(&out)))
    }

    /// Value of one token; `None` only for optional tokens without a value
    fn value(&self, token: Token) -> Result<Option<String>> {
        let value = match token {
            Token::Index => self
                .position
                .map(|i| i.to_string())
                .ok_or_else(|| token.missing("Index"))?,
            Token::Year => self.date(token)?.format("%Y").to_string(),
            Token::MonthNumber => self.date(token)?.format("%m").to_string(),
            Token::MonthName => self.date(token)?.format("%B").to_string(),
            Token::DayNumber => self.date(token)?.format("%d").to_string(),
            Token::DayName => self.date(token)?.format("%A").to_string(),
            Token::Stem => self.stem(token, TagKey::FileName)?,
            Token::OriginalStem => self.stem(token, TagKey::OriginalName)?,
            Token::Extension => self
                .record
                .path()
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Token::TagList => {
                return Ok(self
                    .position
                    .and_then(|i| self.index.tag_list(i))
                    .filter(|list| !list.is_empty())
                    .map(str::to_string))
            }
            Token::Camera => {
                return Ok(self
                    .tags
                    .text(TagKey::Camera)
                    .filter(|camera| !camera.trim().is_empty()))
            }
        };
        Ok(Some(value))
    }

    fn date(&self, token: Token) -> Result<DateTime<Local>> {
        self.tags
            .timestamp(TagKey::Timestamp)
            .or_else(|| self.tags.timestamp(TagKey::DateCreated))
            .or_else(|| self.tags.timestamp(TagKey::DateModified))
            .ok_or_else(|| token.missing("Timestamp"))
    }

    fn stem(&self, token: Token, key: TagKey) -> Result<String> {
        let name = self
            .tags
            .text(key)
            .ok_or_else(|| token.missing(&key.to_string()))?;
        Ok(Path::new(&name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(name))
    }
}

/// Replace characters that are not valid in a path component
pub fn sanitize_component(component: &str) -> String {
    if component == "." || component == ".." {
        return "_".to_string();
    }
    component
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
