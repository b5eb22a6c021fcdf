//! 候选 URL 生成：类型大小写与 __cv 缓存参数的组合探测。
//!
//! 源站对大小写和缓存参数的约定在不同资源类型间并不一致，
//! 因此按固定优先级依次探测，直到某个变体命中。

use crate::manifest::model::AssetEntry;

/// 按固定优先级生成去重后的候选 URL：
/// 1. 原始大小写类型 + `__cv=<hash>`
/// 2. 小写类型 + `__cv=<hash>`
/// 3. 原始大小写类型
/// 4. 小写类型
pub fn candidate_urls(base_url: &str, location_path: &str, entry: &AssetEntry) -> Vec<String> {
    let variants = [(false, true), (true, true), (false, false), (true, false)];
    let mut urls = Vec::with_capacity(variants.len());
    for (lowercase_type, include_hash) in variants {
        let url = build_url(base_url, location_path, entry, lowercase_type, include_hash);
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

fn build_url(
    base_url: &str,
    location_path: &str,
    entry: &AssetEntry,
    lowercase_type: bool,
    include_hash: bool,
) -> String {
    let type_part = if lowercase_type {
        entry.file_type.to_lowercase()
    } else {
        entry.file_type.clone()
    };
    let mut url = format!("{base_url}{location_path}{}.{type_part}", entry.name);
    if include_hash && !entry.hash.trim().is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str("__cv=");
        url.push_str(&entry.hash);
    }
    url
}
