//! 清单同步调度：拉清单、对账、工作池并发下载。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use reqwest::{Client, Response, Url};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::base_system::context::Config;
use crate::manifest::model::{AssetEntry, FileCollection, relative_path, same_asset};
use crate::manifest::{reconcile, store};

use super::candidates::candidate_urls;
use super::outcome::{Outcome, OutcomeSummary, OutcomeTally};
use super::progress::ProgressSink;
use super::rate_limit::RateLimiter;
use super::retry::Fetcher;

/// 清单 URL 拆分：`xml/` 之前为资源基址，之后为基线文件名。
static MANIFEST_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+)xml/(.+\.xml)$").expect("hardcoded pattern"));

pub struct Syncer {
    fetcher: Fetcher,
    max_parallel: usize,
    output_root: PathBuf,
    manifest_dir: PathBuf,
}

impl Syncer {
    pub fn new(config: &Config) -> Result<Self> {
        let max_parallel = config.max_parallel.max(1);
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .pool_max_idle_per_host(max_parallel)
            .build()
            .context("构建 HTTP 客户端失败")?;
        let limiter = Arc::new(RateLimiter::new(config.requests_per_second, config.burst));

        Ok(Self {
            fetcher: Fetcher::new(client, limiter, config.max_retries),
            max_parallel,
            output_root: PathBuf::from(&config.output_dir),
            manifest_dir: PathBuf::from(&config.manifest_dir),
        })
    }

    /// 处理单个清单 URL：拉取、落盘、对账、并发下载。
    ///
    /// 清单自身拉取/解析失败时返回 Err，只中止该清单；
    /// 单个条目的失败只计入汇总，不中止运行。
    pub async fn sync_manifest(&self, manifest_url: &str) -> Result<OutcomeSummary> {
        let caps = MANIFEST_URL
            .captures(manifest_url)
            .ok_or_else(|| anyhow!("无法识别的清单 URL: {manifest_url}"))?;
        let base_url = caps[1].to_string();
        let file_name = caps[2].to_string();
        let baseline_path = self.manifest_dir.join(&file_name);

        let baseline = store::load_baseline(&baseline_path).unwrap_or_else(|err| {
            warn!(
                target: "sync",
                "基线清单 {} 不可用，按空基线处理: {err}",
                baseline_path.display()
            );
            FileCollection::default()
        });

        let raw = self
            .fetcher
            .get_text(manifest_url)
            .await
            .with_context(|| format!("拉取清单失败: {manifest_url}"))?;
        let remote = store::parse(&raw).with_context(|| format!("解析清单失败: {manifest_url}"))?;

        // 清单原文一经成功拉取立即落盘，作为下次运行的基线；
        // 与单个资源是否下载成功解耦。
        store::persist_baseline(&baseline_path, &raw)
            .with_context(|| format!("保存基线清单失败: {}", baseline_path.display()))?;

        info!(target: "sync", "{file_name}: 共 {} 个条目", remote.files.len());
        let started = Instant::now();

        let plan = reconcile::diff(&remote, &baseline, &self.output_root);
        let locations: Arc<HashMap<String, String>> = Arc::new(
            remote
                .locations
                .iter()
                .map(|l| (l.id.clone(), l.path.clone()))
                .collect(),
        );

        let sink = Arc::new(ProgressSink::new(&file_name, plan.len() as u64));
        let tally = Arc::new(OutcomeTally::default());
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let baseline = Arc::new(baseline);
        let base_url = Arc::new(base_url);

        let mut handles = Vec::new();
        for planned in &plan {
            if !planned.needs_fetch {
                tally.record(Outcome::Skipped);
                sink.inc_overall();
                continue;
            }

            let entry = planned.entry.clone();
            let fetcher = self.fetcher.clone();
            let output_root = self.output_root.clone();
            let base_url = base_url.clone();
            let locations = locations.clone();
            let baseline = baseline.clone();
            let sink = sink.clone();
            let tally = tally.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                // 信号量在运行期间不会被关闭
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    tally.record(Outcome::Failed);
                    sink.inc_overall();
                    return;
                };
                let outcome = fetch_entry(
                    &fetcher,
                    &base_url,
                    &locations,
                    &baseline,
                    &entry,
                    &output_root,
                    &sink,
                )
                .await;
                tally.record(outcome);
                sink.inc_overall();
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(target: "sync", "下载任务异常退出: {err}");
                tally.record(Outcome::Failed);
            }
        }
        sink.finish();

        let summary = tally.summary();
        info!(
            target: "sync",
            "{file_name} 完成，耗时 {:.1?}：共 {}，下载 {}，跳过 {}，缺失(404) {}，失败 {}",
            started.elapsed(),
            summary.total(),
            summary.downloaded,
            summary.skipped,
            summary.missing,
            summary.failed
        );
        Ok(summary)
    }

    /// 清单之外的直链文件：目标路径取 URL 的路径部分，已存在则跳过。
    pub async fn download_extra_files(&self, urls: &[String]) -> OutcomeSummary {
        if urls.is_empty() {
            return OutcomeSummary::default();
        }

        info!(target: "sync", "下载附加文件（{} 个）", urls.len());
        let sink = Arc::new(ProgressSink::new("附加文件", urls.len() as u64));
        let tally = Arc::new(OutcomeTally::default());
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let mut handles = Vec::new();
        for url in urls {
            let url = url.clone();
            let fetcher = self.fetcher.clone();
            let output_root = self.output_root.clone();
            let sink = sink.clone();
            let tally = tally.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    tally.record(Outcome::Failed);
                    sink.inc_overall();
                    return;
                };
                let outcome = download_direct(&fetcher, &url, &output_root, &sink).await;
                tally.record(outcome);
                sink.inc_overall();
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(target: "sync", "下载任务异常退出: {err}");
                tally.record(Outcome::Failed);
            }
        }
        sink.finish();

        let summary = tally.summary();
        info!(
            target: "sync",
            "附加文件完成：下载 {}，跳过 {}，缺失(404) {}，失败 {}",
            summary.downloaded,
            summary.skipped,
            summary.missing,
            summary.failed
        );
        summary
    }
}

/// 下载单个清单条目，返回唯一终态；任何失败只影响该条目。
async fn fetch_entry(
    fetcher: &Fetcher,
    base_url: &str,
    locations: &HashMap<String, String>,
    baseline: &FileCollection,
    entry: &AssetEntry,
    output_root: &Path,
    sink: &ProgressSink,
) -> Outcome {
    let Some(location_path) = locations.get(&entry.location) else {
        warn!(
            target: "download",
            "条目 {} 的 location `{}` 在清单中不存在",
            entry.id,
            entry.location
        );
        return Outcome::Failed;
    };

    let rel = relative_path(location_path, entry);
    let target = output_root.join(&rel);

    // 对账结论之外的兜底复查：文件在且基线哈希一致才跳过；
    // 两处判断有分歧时宁可重新下载。
    let baseline_match = baseline.files.iter().find(|old| same_asset(old, entry));
    if target.exists() && baseline_match.is_some_and(|old| old.hash == entry.hash) {
        return Outcome::Skipped;
    }

    for url in candidate_urls(base_url, location_path, entry) {
        let response = match fetcher.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(target: "download", "{rel}: 请求失败: {err}");
                return Outcome::Failed;
            }
        };
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(target: "download", "{rel}: 404，尝试下一个候选 URL");
            continue;
        }
        if status.as_u16() >= 400 {
            warn!(target: "download", "{rel}: HTTP {status}");
            return Outcome::Failed;
        }

        return match stream_to_file(response, &target, &rel, sink).await {
            Ok(()) => Outcome::Downloaded,
            Err(err) => {
                warn!(target: "download", "{rel}: 写入失败: {err}");
                Outcome::Failed
            }
        };
    }

    debug!(target: "download", "{rel}: 所有候选 URL 均为 404");
    Outcome::Missing
}

/// 下载一个直链 URL；目标相对路径 = URL path。
async fn download_direct(
    fetcher: &Fetcher,
    url: &str,
    output_root: &Path,
    sink: &ProgressSink,
) -> Outcome {
    let rel = match Url::parse(url) {
        Ok(parsed) => parsed.path().trim_start_matches('/').to_string(),
        Err(err) => {
            warn!(target: "download", "无效的 URL {url}: {err}");
            return Outcome::Failed;
        }
    };
    if rel.is_empty() {
        warn!(target: "download", "URL 没有路径部分: {url}");
        return Outcome::Failed;
    }

    let target = output_root.join(&rel);
    if target.exists() {
        return Outcome::Skipped;
    }

    let response = match fetcher.get(url).await {
        Ok(response) => response,
        Err(err) => {
            warn!(target: "download", "{rel}: 请求失败: {err}");
            return Outcome::Failed;
        }
    };
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        warn!(target: "download", "{rel}: 404");
        return Outcome::Missing;
    }
    if status.as_u16() >= 400 {
        warn!(target: "download", "{rel}: HTTP {status}");
        return Outcome::Failed;
    }

    match stream_to_file(response, &target, &rel, sink).await {
        Ok(()) => Outcome::Downloaded,
        Err(err) => {
            warn!(target: "download", "{rel}: 写入失败: {err}");
            Outcome::Failed
        }
    }
}

/// 将响应正文流式写入目标文件；进度条在所有退出路径上清理。
async fn stream_to_file(
    response: Response,
    target: &Path,
    desc: &str,
    sink: &ProgressSink,
) -> Result<()> {
    let bar = sink.file_bar(desc, response.content_length());
    let result = write_body(response, target, &bar).await;
    bar.finish_and_clear();
    result
}

async fn write_body(
    mut response: Response,
    target: &Path,
    bar: &indicatif::ProgressBar,
) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(target).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        bar.inc(chunk.len() as u64);
    }
    // 文件句柄随 drop 关闭；flush 保证缓冲写完
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(root: &Path) -> Config {
        Config {
            max_parallel: 4,
            requests_per_second: 10_000.0,
            burst: 64,
            max_retries: 0,
            output_dir: root.join("res").to_string_lossy().into_owned(),
            manifest_dir: root.join("manifests").to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    fn manifest_xml(files: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<filecollection>
  <location id="gfx" path="graphics/"/>
{files}
</filecollection>"#
        )
    }

    const THREE_FILES: &str = r#"  <file debugView="false" hash="h1" id="1" location="gfx" name="a" type="swf" version="1"/>
  <file debugView="false" hash="h2" id="2" location="gfx" name="b" type="swf" version="1"/>
  <file debugView="false" hash="h3" id="3" location="gfx" name="c" type="swf" version="1"/>"#;

    async fn mount_manifest(server: &MockServer, body: &str, expected_hits: u64) {
        Mock::given(method("GET"))
            .and(path("/spacemap/xml/resources.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_hits)
            .mount(server)
            .await;
    }

    async fn mount_asset(server: &MockServer, url_path: &str, body: &str, expected_hits: u64) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_hits)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn downloads_all_entries_on_empty_baseline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start().await;
        let body = manifest_xml(THREE_FILES);

        mount_manifest(&server, &body, 1).await;
        mount_asset(&server, "/spacemap/graphics/a.swf", "AAA", 1).await;
        mount_asset(&server, "/spacemap/graphics/b.swf", "BBB", 1).await;
        mount_asset(&server, "/spacemap/graphics/c.swf", "CCC", 1).await;

        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        let manifest_url = format!("{}/spacemap/xml/resources.xml", server.uri());
        let summary = syncer.sync_manifest(&manifest_url).await.expect("sync");

        assert_eq!(summary.downloaded, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.total(), 3);

        let written = dir.path().join("res/graphics/a.swf");
        assert_eq!(std::fs::read_to_string(written).expect("read"), "AAA");

        // 基线文件是远端原文
        let baseline = dir.path().join("manifests/resources.xml");
        assert_eq!(std::fs::read_to_string(baseline).expect("read"), body);
    }

    #[tokio::test]
    async fn second_run_skips_everything_without_asset_requests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start().await;
        let body = manifest_xml(THREE_FILES);

        mount_manifest(&server, &body, 2).await;
        // 每个资源只允许被请求一次（第一轮）
        mount_asset(&server, "/spacemap/graphics/a.swf", "AAA", 1).await;
        mount_asset(&server, "/spacemap/graphics/b.swf", "BBB", 1).await;
        mount_asset(&server, "/spacemap/graphics/c.swf", "CCC", 1).await;

        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        let manifest_url = format!("{}/spacemap/xml/resources.xml", server.uri());

        let first = syncer.sync_manifest(&manifest_url).await.expect("run 1");
        assert_eq!(first.downloaded, 3);

        let second = syncer.sync_manifest(&manifest_url).await.expect("run 2");
        assert_eq!(second.skipped, 3);
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.total(), 3);
    }

    #[tokio::test]
    async fn unresolvable_location_fails_only_that_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start().await;
        let files = r#"  <file hash="h1" id="1" location="gfx" name="a" type="swf" version="1"/>
  <file hash="h2" id="2" location="nowhere" name="b" type="swf" version="1"/>
  <file hash="h3" id="3" location="gfx" name="c" type="swf" version="1"/>"#;
        let body = manifest_xml(files);

        mount_manifest(&server, &body, 1).await;
        mount_asset(&server, "/spacemap/graphics/a.swf", "AAA", 1).await;
        mount_asset(&server, "/spacemap/graphics/c.swf", "CCC", 1).await;

        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        let manifest_url = format!("{}/spacemap/xml/resources.xml", server.uri());
        let summary = syncer.sync_manifest(&manifest_url).await.expect("sync");

        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 3);
    }

    #[tokio::test]
    async fn all_candidates_404_is_missing_without_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start().await;
        // 未挂载任何资源 mock：所有候选 URL 都得到 404
        let files = r#"  <file hash="abc123" id="1" location="gfx" name="ship" type="SWF" version="1"/>"#;
        mount_manifest(&server, &manifest_xml(files), 1).await;

        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        let manifest_url = format!("{}/spacemap/xml/resources.xml", server.uri());
        let summary = syncer.sync_manifest(&manifest_url).await.expect("sync");

        assert_eq!(summary.missing, 1);
        assert_eq!(summary.total(), 1);
        assert!(!dir.path().join("res/graphics/ship.SWF").exists());
        assert!(!dir.path().join("res/graphics/ship.swf").exists());
    }

    #[tokio::test]
    async fn terminal_status_on_candidate_is_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start().await;
        let files = r#"  <file hash="h1" id="1" location="gfx" name="a" type="swf" version="1"/>"#;
        mount_manifest(&server, &manifest_xml(files), 1).await;
        Mock::given(method("GET"))
            .and(path("/spacemap/graphics/a.swf"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        let manifest_url = format!("{}/spacemap/xml/resources.xml", server.uri());
        let summary = syncer.sync_manifest(&manifest_url).await.expect("sync");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 1);
    }

    #[tokio::test]
    async fn unrecognized_manifest_url_aborts_that_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        assert!(
            syncer
                .sync_manifest("https://cdn.example/resources.xml")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn extra_files_skip_existing_and_fetch_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start().await;

        mount_asset(&server, "/spacemap/main.swf", "MAIN", 1).await;

        // 已存在的文件不再请求
        let existing = dir.path().join("res/spacemap/graphics/maps-config.xml");
        std::fs::create_dir_all(existing.parent().expect("parent")).expect("mkdir");
        std::fs::write(&existing, "old").expect("write");

        let syncer = Syncer::new(&test_config(dir.path())).expect("syncer");
        let urls = vec![
            format!("{}/spacemap/main.swf", server.uri()),
            format!("{}/spacemap/graphics/maps-config.xml", server.uri()),
            format!("{}/spacemap/gone.swf", server.uri()),
        ];
        let summary = syncer.download_extra_files(&urls).await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("res/spacemap/main.swf")).expect("read"),
            "MAIN"
        );
        assert_eq!(std::fs::read_to_string(existing).expect("read"), "old");
    }
}
