//! 清单数据模型。

use std::collections::HashMap;

use serde::Deserialize;

/// 清单中的一个远端文件描述。
///
/// `hash` 由源站分配，内容变化时随之变化；`debug_view`
/// 在下载逻辑中不参与任何判定。
#[derive(Debug, Clone, Deserialize)]
pub struct AssetEntry {
    #[serde(rename = "@debugView", default)]
    pub debug_view: bool,
    #[serde(rename = "@hash", default)]
    pub hash: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@location")]
    pub location: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub file_type: String,
    #[serde(rename = "@version", default)]
    pub version: i64,
}

/// 一个具名路径前缀，`AssetEntry::location` 外键指向它。
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@path")]
    pub path: String,
}

/// 一份完整清单：location 表 + 有序的文件条目。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCollection {
    #[serde(rename = "location", default)]
    pub locations: Vec<Location>,
    #[serde(rename = "file", default)]
    pub files: Vec<AssetEntry>,
}

impl FileCollection {
    /// location id -> path 的查找表，键唯一。
    pub fn location_map(&self) -> HashMap<&str, &str> {
        self.locations
            .iter()
            .map(|l| (l.id.as_str(), l.path.as_str()))
            .collect()
    }
}

/// 判断两个条目是否为同一资源版本：
/// (id, location, type, version, hash) 五元组全部一致。
///
/// 不在 AssetEntry 上派生 PartialEq，避免 debugView/name
/// 这类非身份字段误入比较。
pub fn same_asset(a: &AssetEntry, b: &AssetEntry) -> bool {
    a.id == b.id
        && a.location == b.location
        && a.file_type == b.file_type
        && a.version == b.version
        && a.hash == b.hash
}

/// 条目的相对存盘路径：location path + name + "." + type。
pub fn relative_path(location_path: &str, entry: &AssetEntry) -> String {
    format!("{}{}.{}", location_path, entry.name, entry.file_type)
}
