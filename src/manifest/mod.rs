//! 清单（filecollection XML）模块入口。
//!
//! 子模块：
//! - `model`     — 数据模型（AssetEntry / Location / FileCollection）
//! - `store`     — XML 解析与本地基线文件读写
//! - `reconcile` — 远端清单与本地基线的对账

pub mod model;
pub mod reconcile;
pub mod store;
