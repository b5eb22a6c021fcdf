//! 进度上报与 CLI 进度条管理。
//!
//! 纯观测用途：每个清单一个总进度条，每个下载中的文件一个
//! 字节进度条（Content-Length 未知时退化为 spinner）。

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

pub struct ProgressSink {
    mp: MultiProgress,
    overall: ProgressBar,
}

impl ProgressSink {
    pub fn new(label: &str, total: u64) -> Self {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let overall = mp.add(ProgressBar::new(total));
        overall.set_style(style);
        overall.set_prefix(label.to_string());

        Self { mp, overall }
    }

    /// 单个文件的字节进度条；长度未知时退化为 spinner。
    pub fn file_bar(&self, desc: &str, len: Option<u64>) -> ProgressBar {
        let bar = match len {
            Some(len) if len > 0 => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template("{msg} {wide_bar} {bytes}/{total_bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            _ => ProgressBar::new_spinner(),
        };
        let bar = self.mp.add(bar);
        bar.set_message(desc.to_string());
        bar
    }

    /// 一个条目落定一个终态时调用一次。
    pub fn inc_overall(&self) {
        self.overall.inc(1);
    }

    pub fn finish(&self) {
        self.overall.finish_and_clear();
    }
}
