//! 带退避重试的 HTTP GET：429/5xx 自动重试，其余状态原样返回。

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::rate_limit::RateLimiter;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;
const JITTER_MAX_MS: u64 = 250;

/// 封装单个 GET 请求的重试策略。
///
/// 每次尝试（含重试）都先向共享限流器取令牌；退避睡眠期间不占用令牌。
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, max_retries: u32) -> Self {
        Self {
            client,
            limiter,
            max_retries,
        }
    }

    /// 发出 GET，只读响应头，正文留给调用方消费。
    ///
    /// 返回 Ok 不代表成功状态：最后一次尝试、或不可重试的状态码
    /// （404 在内）会把响应原样交给调用方判定；网络层错误向上传播，
    /// 由调用方按单个任务失败处理。
    pub async fn get(&self, url: &str) -> reqwest::Result<Response> {
        let mut attempt: u32 = 1;
        loop {
            self.limiter.acquire().await;
            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status.as_u16() < 400 {
                return Ok(response);
            }
            if attempt > self.max_retries || !is_retryable(status) {
                return Ok(response);
            }

            let delay = retry_delay(status, response.headers(), attempt);
            debug!(
                target: "fetch",
                "GET {url} 返回 {status}，{}ms 后重试（第 {attempt}/{} 次）",
                delay.as_millis(),
                self.max_retries
            );
            drop(response);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// GET 并读取完整文本；非成功状态视为错误（用于清单拉取）。
    pub async fn get_text(&self, url: &str) -> reqwest::Result<String> {
        let response = self.get(url).await?;
        response.error_for_status()?.text().await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_delay(status: StatusCode, headers: &HeaderMap, attempt: u32) -> Duration {
    let retry_after = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
    base_delay(status, retry_after, attempt) + jitter()
}

/// 抖动前的基础退避时长。
///
/// - 429 带 Retry-After：按其值（相对秒数或 HTTP 日期，时钟偏差取零）；
/// - 429 无该头：固定 1 秒；
/// - 5xx：`min(500ms * 2^(attempt-1), 8000ms)` 指数退避。
fn base_delay(status: StatusCode, retry_after: Option<&str>, attempt: u32) -> Duration {
    if status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(hint) = retry_after.and_then(parse_retry_after) {
            return hint;
        }
        return Duration::from_secs(1);
    }
    let shift = attempt.saturating_sub(1).min(4);
    Duration::from_millis((BACKOFF_BASE_MS << shift).min(BACKOFF_CAP_MS))
}

/// Retry-After 头：相对秒数或 HTTP 日期；过去的时间点取零。
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(
        when.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MAX_MS))
}
