//! 重定向解析模块：唯一会发起网络 I/O 的部分
pub mod fetcher;
pub mod resolver;

// 导出核心接口
pub use self::fetcher::{Hop, HopFetcher, HttpHopFetcher};
pub use self::resolver::{RedirectResolver, Resolution, StopReason};
