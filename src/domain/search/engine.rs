// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// 爬虫核心错误类型
///
/// 网络瞬断和反爬拦截不在此列：请求管道内部无限重试，永远不会向上抛出。
#[derive(Debug, Error)]
pub enum SpiderError {
    /// 无法归类的空结果页耗尽重试预算，当前关键词/批次中止
    #[error("尝试多次依然无法获取到正确内容：{engine} 关键词「{keyword}」第 {page} 页，共 {attempts} 次")]
    ExtractionExhausted {
        engine: &'static str,
        keyword: String,
        page: u32,
        attempts: u32,
    },
    /// 跳转包装链接的响应里没有 Location 头
    #[error("redirect response missing Location header: {0}")]
    MissingRedirect(String),
    /// 缺少输入文件/目录、报价表格式损坏等，直接报给操作者，不写日志文件
    #[error("配置错误：{0}")]
    Config(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Settings(#[from] config::ConfigError),
}

impl SpiderError {
    /// 配置类错误直接显示给操作者，不产生诊断日志文件
    pub fn is_configuration(&self) -> bool {
        matches!(self, SpiderError::Config(_) | SpiderError::Settings(_))
    }
}

/// 结果条目的真实地址是如何取得的
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlExtraction {
    /// 标记里直接带着目的地址
    Direct(String),
    /// 链接跟踪包装，目的地址在 HEAD 请求的 Location 头里
    FollowRedirect(String),
    /// 不透明的中转页，需要抓取后再让适配器从页面里提取
    FollowWrapper(String),
    /// script 伪链接或没有地址，跳过该条目
    Skip,
}

/// 搜索引擎适配器：唯一的多态接缝
///
/// 每个引擎一个实现，封装查询构造、标记提取和反爬特征判断。
/// 适配器不持有任何运行状态（上次请求时间、失败计数等都在管道里），
/// 整个运行周期内只读。
pub trait EngineAdapter: Send + Sync {
    /// 输出表格里使用的引擎显示名
    fn engine_name(&self) -> &'static str;
    fn base_url(&self) -> &'static str;
    fn user_agent(&self) -> &'static str;
    /// 两次请求之间的最小间隔
    fn request_interval(&self) -> Duration;

    /// 是否复用带 Cookie 的会话
    ///
    /// 大多数引擎带会话返回的数据更接近真实情况；搜狗 PC 的反爬系统
    /// 会在同一会话翻到第五页左右时触发，必须使用无会话的独立请求。
    fn uses_session(&self) -> bool {
        true
    }

    /// 构造某关键词第 page 页的查询参数
    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)>;

    /// 定位结果列表里的所有条目，容器存在但为空时返回空表
    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>>;

    /// 条目的真实地址或取得它的方式
    fn extract_item_url(&self, item: ElementRef<'_>, page_url: &Url) -> UrlExtraction;

    /// 从 `FollowWrapper` 中转页里提取真实地址
    fn extract_wrapped_url(&self, _final_url: &Url, _document: &Html) -> Option<String> {
        None
    }

    /// 条目标题：可见文本节点拼接，不含注释节点
    fn extract_item_title(&self, item: ElementRef<'_>) -> String;

    fn has_next_page(&self, document: &Html) -> bool;

    /// 部分引擎页码查询不可靠，只能原样跟随页面给出的下一页地址
    fn next_page_url(&self, _document: &Html) -> Option<String> {
        None
    }

    /// 是否为验证码/反爬拦截页
    fn is_blocked(&self, _final_url: &Url, _document: &Html) -> bool {
        false
    }

    /// 确认的零结果页（引擎自己的文案），与拦截页严格区分
    fn has_no_results(&self, document: &Html) -> bool;

    /// 已知的瞬态渲染异常（如容器存在但为空），重试即可恢复
    fn should_retry_page(&self, _document: &Html) -> bool {
        false
    }

    /// 引擎对单个条目标记的安全提醒
    fn is_unsafe_listing(&self, _item: ElementRef<'_>) -> bool {
        false
    }
}
