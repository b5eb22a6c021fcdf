//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 路径配置
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,

    // 资源清单
    #[serde(default = "default_manifest_urls")]
    pub manifest_urls: Vec<String>,
    #[serde(default = "default_extra_files")]
    pub extra_files: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            max_retries: default_max_retries(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            output_dir: default_output_dir(),
            manifest_dir: default_manifest_dir(),
            manifest_urls: default_manifest_urls(),
            extra_files: default_extra_files(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 10] = [
            FieldMeta {
                name: "max_parallel",
                description: "最大并发下载数",
            },
            FieldMeta {
                name: "requests_per_second",
                description: "每秒请求数预算（令牌桶持续速率）",
            },
            FieldMeta {
                name: "burst",
                description: "令牌桶突发容量（可囤积的令牌上限）",
            },
            FieldMeta {
                name: "max_retries",
                description: "429/5xx 的最大重试次数",
            },
            FieldMeta {
                name: "request_timeout",
                description: "单个请求的总超时时间（秒，含连接与正文传输）",
            },
            FieldMeta {
                name: "user_agent",
                description: "HTTP User-Agent",
            },
            FieldMeta {
                name: "output_dir",
                description: "资源输出根目录",
            },
            FieldMeta {
                name: "manifest_dir",
                description: "本地基线清单保存目录",
            },
            FieldMeta {
                name: "manifest_urls",
                description: "要处理的清单 URL 列表（按顺序逐个处理）",
            },
            FieldMeta {
                name: "extra_files",
                description: "清单之外的直链文件列表（已存在则跳过）",
            },
        ];
        &FIELDS
    }
}

fn default_max_parallel() -> usize {
    10
}

fn default_requests_per_second() -> f64 {
    6.0
}

fn default_burst() -> u32 {
    6
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    600
}

fn default_user_agent() -> String {
    format!("darkorbit-resource-downloader/{}", env!("CARGO_PKG_VERSION"))
}

fn default_output_dir() -> String {
    "do_resources".to_string()
}

fn default_manifest_dir() -> String {
    "manifests".to_string()
}

fn default_manifest_urls() -> Vec<String> {
    [
        "https://darkorbit-22.bpsecure.com/spacemap/xml/resources.xml",
        "https://darkorbit-22.bpsecure.com/spacemap/xml/resources_3d.xml",
        "https://darkorbit-22.bpsecure.com/do_img/global/xml/resource_items.xml",
        "https://darkorbit-22.bpsecure.com/swf_global/inventory/xml/assets.xml",
        "https://darkorbit-22.bpsecure.com/swf_global/xml/assets.xml",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_extra_files() -> Vec<String> {
    [
        "https://darkorbit-22.bpsecure.com/spacemap/main.swf",
        "https://darkorbit-22.bpsecure.com/swf_global/inventory/inventory.swf",
        "https://darkorbit-22.bpsecure.com/spacemap/graphics/maps-config.xml",
        "https://darkorbit-22.bpsecure.com/spacemap/graphics/spacemap-config.xml",
        "https://darkorbit-22.bpsecure.com/spacemap/templates/en/flashres.xml",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
