//! 下载子系统模块入口。
//!
//! 子模块：
//! - `rate_limit` — 全局共享的令牌桶限流器
//! - `retry`      — 带退避重试的 HTTP GET 封装
//! - `candidates` — 候选 URL 生成（大小写/缓存参数变体）
//! - `outcome`    — 下载终态与线程安全计数
//! - `progress`   — indicatif 进度条管理
//! - `syncer`     — 清单同步与工作池调度

pub mod candidates;
pub mod outcome;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod syncer;
