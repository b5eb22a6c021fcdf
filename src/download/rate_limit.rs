//! 令牌桶限流器：所有出站请求共享一个实例。

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// 令牌桶：按 `rate` 每秒连续补充令牌，最多囤积 `burst` 个。
///
/// `acquire` 在无可用令牌时挂起调用方直到补充到位，永不失败；
/// 排队由挂起的调用方隐式构成，桶本身不设队列上限。
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    refreshed: Instant,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: u32) -> Self {
        let rate = if rate > 0.0 { rate } else { 1.0 };
        let burst = f64::from(burst.max(1));
        Self {
            rate,
            burst,
            state: Mutex::new(Bucket {
                tokens: burst,
                refreshed: Instant::now(),
            }),
        }
    }

    /// 取走一个令牌；必要时挂起等待补充。
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.refreshed).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
                bucket.refreshed = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                // 下限 1ms，避免浮点误差把等待时间舍入成零造成空转
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
                    .max(Duration::from_millis(1))
            };
            tokio::time::sleep(wait).await;
        }
    }
}
