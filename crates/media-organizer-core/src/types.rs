use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of entry a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Directory,
    Image,
    Video,
    Music,
    Audio,
    GenericFile,
}

impl MediaKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Keys of the facts a decoder can report about a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagKey {
    FileName,
    OriginalName,
    Size,
    DateCreated,
    DateModified,
    Timestamp,
    Tags,
    Title,
    Artist,
    AlbumArtist,
    Album,
    Year,
    Genre,
    Track,
    Disc,
    Comment,
    Composer,
    Encoder,
    Bpm,
    Copyright,
    Grouping,
    Category,
    Keyword,
    Description,
    Width,
    Height,
    Resolution,
    Camera,
    Checksum,
    Version,
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Typed value of a single tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Local>),
    List(Vec<String>),
}

impl TagValue {
    /// Text value, or an integer parsed from text when it is purely numeric
    pub fn numeric_or_text(text: String) -> Self {
        match text.trim().parse::<i64>() {
            Ok(n) => Self::Integer(n),
            Err(_) => Self::Text(text),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Tag map of one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<TagKey, TagValue>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TagKey, value: TagValue) -> Option<TagValue> {
        self.0.insert(key, value)
    }

    pub fn insert_text(&mut self, key: TagKey, text: impl Into<String>) {
        self.0.insert(key, TagValue::Text(text.into()));
    }

    pub fn insert_integer(&mut self, key: TagKey, value: i64) {
        self.0.insert(key, TagValue::Integer(value));
    }

    pub fn get(&self, key: TagKey) -> Option<&TagValue> {
        self.0.get(&key)
    }

    pub fn contains(&self, key: TagKey) -> bool {
        self.0.contains_key(&key)
    }

    /// Text form of any value stored under `key`
    pub fn text(&self, key: TagKey) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn integer(&self, key: TagKey) -> Option<i64> {
        match self.get(key)? {
            TagValue::Integer(n) => Some(*n),
            TagValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, key: TagKey) -> Option<DateTime<Local>> {
        match self.get(key)? {
            TagValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn list(&self, key: TagKey) -> Option<&[String]> {
        match self.get(key)? {
            TagValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Merge `other` into `self`, keeping the existing value on key clash
    pub fn merge_missing(&mut self, other: Tags) {
        for (key, value) in other.0 {
            self.0.entry(key).or_insert(value);
        }
    }

    /// Merge `other` into `self`, replacing existing values on key clash
    pub fn extend(&mut self, other: Tags) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &TagValue)> {
        self.0.iter()
    }
}

/// Uniform record produced for one file or directory
///
/// `tags` is `None` exactly when `kind` is [`MediaKind::Directory`]; the
/// constructors are the only way to build a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaData {
    kind: MediaKind,
    path: PathBuf,
    tags: Option<Tags>,
}

impl MetaData {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: MediaKind::Directory,
            path: path.into(),
            tags: None,
        }
    }

    /// Build a file record. A `Directory` kind is demoted to `GenericFile`
    /// since files always carry tags.
    pub fn file(kind: MediaKind, path: impl Into<PathBuf>, tags: Tags) -> Self {
        let kind = if kind.is_directory() {
            MediaKind::GenericFile
        } else {
            kind
        };
        Self {
            kind,
            path: path.into(),
            tags: Some(tags),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tags(&self) -> Option<&Tags> {
        self.tags.as_ref()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn into_parts(self) -> (MediaKind, PathBuf, Option<Tags>) {
        (self.kind, self.path, self.tags)
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_has_no_tags() {
        let dir = MetaData::directory("/media");
        assert!(dir.is_directory());
        assert!(dir.tags().is_none());
    }

    #[test]
    fn test_file_always_has_tags() {
        let record = MetaData::file(MediaKind::Directory, "/media/a.bin", Tags::new());
        assert_eq!(record.kind(), MediaKind::GenericFile);
        assert!(record.tags().is_some());
    }

    #[test]
    fn test_numeric_or_text() {
        assert_eq!(
            TagValue::numeric_or_text("2021".to_string()),
            TagValue::Integer(2021)
        );
        assert_eq!(
            TagValue::numeric_or_text("MMXXI".to_string()),
            TagValue::Text("MMXXI".to_string())
        );
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut primary = Tags::new();
        primary.insert_text(TagKey::Title, "v2 title");

        let mut secondary = Tags::new();
        secondary.insert_text(TagKey::Title, "v1 title");
        secondary.insert_text(TagKey::Album, "v1 album");

        primary.merge_missing(secondary);
        assert_eq!(primary.text(TagKey::Title).as_deref(), Some("v2 title"));
        assert_eq!(primary.text(TagKey::Album).as_deref(), Some("v1 album"));
    }

    #[test]
    fn test_list_display_joins_with_comma() {
        let value = TagValue::List(vec!["beach".into(), "family".into()]);
        assert_eq!(value.to_string(), "beach, family");
    }
}
