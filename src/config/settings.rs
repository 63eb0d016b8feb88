// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// 应用程序配置设置
///
/// 所有运行期可调参数：抓取深度、退避间隔、分组模式、定时时刻和目录路径。
/// 启动时构建一次，之后只读。
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 抓取配置
    pub crawl: CrawlSettings,
    /// 定时运行配置
    pub schedule: ScheduleSettings,
    /// 输入输出目录配置
    pub io: IoSettings,
    /// 各搜索引擎的单独配置，键为引擎 id（如 "baidu-pc"）
    #[serde(default)]
    pub engines: HashMap<String, EngineSettings>,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSettings {
    /// 每个关键词最多抓取的页数
    pub page_depth: u32,
    /// 网络断开后的重连等待时间（秒）
    pub reconnect_interval_secs: f64,
    /// 被判定为爬虫等异常情况下的等待时间（秒）
    pub error_interval_secs: f64,
    /// 首次请求之外允许的无法归类空页重试次数，超出即视为致命错误
    pub max_empty_retries: u32,
    /// 关键词与域名的配对方式
    pub grouping_mode: GroupingMode,
}

/// 关键词与目标域名的两种分组模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// 文件内每个关键词对照文件内出现过的所有域名
    CrossProduct,
    /// 每行配对一个关键词和一个域名，多行累积多个域名
    ExplicitPairs,
}

/// 定时运行配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    /// 每天开始查询的整点（0-23）
    pub hour: u32,
}

/// 输入输出目录配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct IoSettings {
    /// 关键词排名查询的输入表格目录
    pub input_dir: String,
    /// 收录查询的网址列表目录
    pub site_dir: String,
    /// 核对收费使用的报价表目录
    pub price_dir: String,
    /// 所有输出产物（表格、日志、异常页面）的目录
    pub output_dir: String,
}

/// 单个搜索引擎的配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// 两次请求之间的最小间隔（秒）
    pub request_interval_secs: f64,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 默认值 → `config/default` 文件（可选）→ `RANKSPIDER__` 前缀环境变量
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_file("config/default")
    }

    /// 从指定配置文件创建配置实例
    pub fn with_file(path: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Default crawl settings
            .set_default("crawl.page_depth", 10)?
            .set_default("crawl.reconnect_interval_secs", 1.0)?
            .set_default("crawl.error_interval_secs", 60.0)?
            .set_default("crawl.max_empty_retries", 5)?
            .set_default("crawl.grouping_mode", "cross-product")?
            // Default schedule settings
            .set_default("schedule.hour", 6)?
            // Default I/O directories
            .set_default("io.input_dir", "import")?
            .set_default("io.site_dir", "site-import")?
            .set_default("io.price_dir", "报价")?
            .set_default("io.output_dir", "output")?;

        // Default pacing per engine
        for (id, interval) in [
            ("shenma", 2.0),
            ("sogou-pc", 6.0),
            ("sogou-mobile", 3.0),
            ("baidu-pc", 5.0),
            ("baidu-mobile", 3.0),
            ("so-pc", 5.0),
            ("so-mobile", 3.0),
        ] {
            builder = builder
                .set_default(format!("engines.{}.request_interval_secs", id), interval)?;
        }

        let builder = builder
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("RANKSPIDER").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        if settings.schedule.hour > 23 {
            return Err(ConfigError::Message(format!(
                "schedule.hour 必须在 0-23 之间，当前为 {}",
                settings.schedule.hour
            )));
        }
        Ok(settings)
    }

    /// 指定引擎的请求间隔，未单独配置时回落到 3 秒
    pub fn request_interval(&self, engine_id: &str) -> Duration {
        let secs = self
            .engines
            .get(engine_id)
            .map(|e| e.request_interval_secs)
            .unwrap_or(3.0);
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_file() {
        let settings = Settings::with_file("does/not/exist").unwrap();
        assert_eq!(settings.crawl.page_depth, 10);
        assert_eq!(settings.crawl.max_empty_retries, 5);
        assert_eq!(settings.crawl.grouping_mode, GroupingMode::CrossProduct);
        assert_eq!(settings.schedule.hour, 6);
        assert_eq!(
            settings.request_interval("sogou-pc"),
            Duration::from_secs_f64(6.0)
        );
        // Unknown engines fall back to the shared default.
        assert_eq!(
            settings.request_interval("nonexistent"),
            Duration::from_secs_f64(3.0)
        );
    }
}
