use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::types::{TagKey, TagValue, Tags};

/// Tags every file carries: name, size and filesystem timestamps
pub fn filesystem_tags(path: &Path) -> io::Result<Tags> {
    let metadata = fs::metadata(path)?;
    let mut tags = Tags::new();

    if let Some(name) = path.file_name() {
        let name = name.to_string_lossy().into_owned();
        tags.insert_text(TagKey::OriginalName, name.clone());
        tags.insert_text(TagKey::FileName, name);
    }
    tags.insert_integer(TagKey::Size, metadata.len() as i64);

    // Creation time is not available on every platform
    if let Ok(created) = metadata.created() {
        let created: DateTime<Local> = created.into();
        tags.insert(TagKey::DateCreated, TagValue::Timestamp(created));
    }
    let modified: DateTime<Local> = metadata.modified()?.into();
    tags.insert(TagKey::DateModified, TagValue::Timestamp(modified));

    Ok(tags)
}
