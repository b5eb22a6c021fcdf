//! 下载终态与线程安全计数。

use std::sync::atomic::{AtomicU64, Ordering};

/// 单个条目下载任务的终态，四选一，互斥且必达。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 成功下载并写盘
    Downloaded,
    /// 本地已是最新，未发请求
    Skipped,
    /// 所有候选 URL 均 404
    Missing,
    /// location 解析失败 / 非 404 错误状态 / 网络或写盘失败
    Failed,
}

/// 跨 worker 共享的终态计数器；只用于末尾汇总，不影响控制流。
#[derive(Debug, Default)]
pub struct OutcomeTally {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    missing: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub downloaded: u64,
    pub skipped: u64,
    pub missing: u64,
    pub failed: u64,
}

impl OutcomeSummary {
    pub fn total(&self) -> u64 {
        self.downloaded + self.skipped + self.missing + self.failed
    }
}

impl OutcomeTally {
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Downloaded => &self.downloaded,
            Outcome::Skipped => &self.skipped,
            Outcome::Missing => &self.missing,
            Outcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
