//! 远端清单与本地基线的对账。

use std::path::Path;

use super::model::{AssetEntry, FileCollection, relative_path, same_asset};

/// 一个远端条目及其对账结论。
#[derive(Debug)]
pub struct PlannedFetch<'a> {
    pub entry: &'a AssetEntry,
    pub needs_fetch: bool,
}

/// 对每个远端条目判断是否需要下载。
///
/// 需要下载的条件（满足任一）：
/// - 目标文件在磁盘上不存在（location 无法解析时同样视为不存在）；
/// - 基线中没有 (id, location, type, version, hash) 完全一致的条目。
///
/// 对账只增不删：基线里有而远端没有的条目不做清理。
pub fn diff<'a>(
    remote: &'a FileCollection,
    baseline: &FileCollection,
    output_root: &Path,
) -> Vec<PlannedFetch<'a>> {
    let locations = remote.location_map();

    remote
        .files
        .iter()
        .map(|entry| {
            let exists = locations
                .get(entry.location.as_str())
                .map(|path| output_root.join(relative_path(path, entry)).exists())
                .unwrap_or(false);
            let baseline_match = baseline.files.iter().any(|old| same_asset(old, entry));

            PlannedFetch {
                entry,
                needs_fetch: !(exists && baseline_match),
            }
        })
        .collect()
}
