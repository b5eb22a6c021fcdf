//! 清单 XML 解析与本地基线文件读写。
//!
//! 基线文件保存的是远端清单的原文，不做任何再序列化，
//! 保证落盘内容与最后一次成功拉取的字节完全一致。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::model::FileCollection;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid manifest xml: {0}")]
    Parse(#[from] quick_xml::DeError),
}

/// 解析 filecollection XML 文本。
pub fn parse(xml: &str) -> Result<FileCollection, ManifestError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// 读取上一次运行保存的基线清单；文件不存在视为空清单。
pub fn load_baseline(path: &Path) -> Result<FileCollection, ManifestError> {
    if !path.exists() {
        return Ok(FileCollection::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw)
}

/// 将远端清单原文覆盖写入基线文件。
pub fn persist_baseline(path: &Path, raw: &str) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ManifestError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, raw).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<filecollection>
  <location id="gfx" path="spacemap/graphics/"/>
  <location id="snd" path="spacemap/sounds/"/>
  <file debugView="false" hash="abc123" id="1" location="gfx" name="ship" type="SWF" version="2"/>
  <file debugView="true" hash="def456" id="2" location="snd" name="laser" type="mp3" version="1"/>
</filecollection>"#;

    #[test]
    fn parses_locations_and_files() {
        let collection = parse(SAMPLE).expect("parse");
        assert_eq!(collection.locations.len(), 2);
        assert_eq!(collection.files.len(), 2);

        let first = &collection.files[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.hash, "abc123");
        assert_eq!(first.location, "gfx");
        assert_eq!(first.name, "ship");
        assert_eq!(first.file_type, "SWF");
        assert_eq!(first.version, 2);
        assert!(!first.debug_view);
        assert!(collection.files[1].debug_view);
    }

    #[test]
    fn optional_attributes_take_defaults() {
        let xml = r#"<filecollection>
  <location id="gfx" path="graphics/"/>
  <file id="1" location="gfx" name="ship" type="swf"/>
</filecollection>"#;
        let collection = parse(xml).expect("parse");
        let entry = &collection.files[0];
        assert_eq!(entry.hash, "");
        assert_eq!(entry.version, 0);
        assert!(!entry.debug_view);
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(parse("<filecollection><file").is_err());
    }

    #[test]
    fn missing_baseline_is_empty_collection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let collection = load_baseline(&dir.path().join("resources.xml")).expect("load");
        assert!(collection.files.is_empty());
        assert!(collection.locations.is_empty());
    }

    #[test]
    fn persist_then_load_roundtrips_raw_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("resources.xml");

        persist_baseline(&path, SAMPLE).expect("persist");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), SAMPLE);

        let collection = load_baseline(&path).expect("load");
        assert_eq!(collection.files.len(), 2);
    }
}
