// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Local};
use serde::Serialize;

/// 一条排名记录：某个目标域名在某关键词搜索结果中的位置
///
/// 一个结果条目最多归属一个目标域名（首个匹配的目标生效），创建后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRecord {
    pub domain: String,
    pub keyword: String,
    /// 1-based page number
    pub page: u32,
    /// 1-based rank within the page
    pub rank: u32,
    pub url: String,
    pub title: String,
    pub checked_at: DateTime<Local>,
}

impl RankRecord {
    pub fn new(
        domain: String,
        keyword: String,
        page: u32,
        rank: u32,
        url: String,
        title: String,
    ) -> Self {
        Self {
            domain,
            keyword,
            page,
            rank,
            url,
            title,
            checked_at: Local::now(),
        }
    }

    /// 跨页的全局排名
    pub fn global_rank(&self) -> u32 {
        super::global_rank(self.page, self.rank)
    }
}

/// 关键词空白与安全提醒审计记录
///
/// 两种形态：关键词级（首页是否确认无结果，`no_result` 有值）和条目级
/// （带安全提醒的结果条目，url/page/rank 有值）。
#[derive(Debug, Clone, PartialEq)]
pub struct UnsafeItemRecord {
    pub keyword: String,
    pub no_result: Option<bool>,
    pub url: Option<String>,
    pub page: Option<u32>,
    pub rank: Option<u32>,
}

impl UnsafeItemRecord {
    /// 关键词级记录：首页是否为确认的无结果页
    pub fn blank_check(keyword: impl Into<String>, no_result: bool) -> Self {
        Self {
            keyword: keyword.into(),
            no_result: Some(no_result),
            url: None,
            page: None,
            rank: None,
        }
    }

    /// 条目级记录：带安全提醒的结果
    pub fn unsafe_listing(keyword: impl Into<String>, url: String, page: u32, rank: u32) -> Self {
        Self {
            keyword: keyword.into(),
            no_result: None,
            url: Some(url),
            page: Some(page),
            rank: Some(rank),
        }
    }
}

/// 查询过程中产生的非致命错误，带上下文写入日志产物
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub keyword: String,
    pub page: Option<u32>,
    pub detail: String,
}

impl ErrorRecord {
    pub fn new(keyword: impl Into<String>, page: Option<u32>, detail: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            page,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.page {
            Some(page) => write!(
                f,
                "关键词：{}，页数：{}，错误：\n{}",
                self.keyword, page, self.detail
            ),
            None => write!(f, "关键词：{}，错误：\n{}", self.keyword, self.detail),
        }
    }
}
