// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::search::{EngineAdapter, UrlExtraction};
use crate::infrastructure::search::{element_text, DESKTOP_USER_AGENT};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

static RESULTS_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.results").unwrap());
static ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.results > div").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static NEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#sogou_next").unwrap());
static NUM_TIPS_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p.num-tips").unwrap());

/// 搜狗 PC 搜索
pub struct SogouPcEngine {
    interval: Duration,
}

impl SogouPcEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl EngineAdapter for SogouPcEngine {
    fn engine_name(&self) -> &'static str {
        "搜狗PC"
    }

    fn base_url(&self) -> &'static str {
        "http://www.sogou.com/web"
    }

    fn user_agent(&self) -> &'static str {
        DESKTOP_USER_AGENT
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    /// 持久会话翻到第五页左右就会被判定为爬虫，改用无会话请求
    fn uses_session(&self) -> bool {
        false
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![("query", keyword.to_string()), ("page", page.to_string())]
    }

    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&ITEM_SELECTOR).collect()
    }

    fn extract_item_url(&self, item: ElementRef<'_>, _page_url: &Url) -> UrlExtraction {
        match item
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|link| link.value().attr("href"))
        {
            Some(href) => UrlExtraction::Direct(href.to_string()),
            None => UrlExtraction::Skip,
        }
    }

    fn extract_item_title(&self, item: ElementRef<'_>) -> String {
        item.select(&LINK_SELECTOR)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    fn has_next_page(&self, document: &Html) -> bool {
        document.select(&NEXT_SELECTOR).next().is_some()
    }

    /// 反爬跳转或结果容器整体缺失都按拦截处理
    fn is_blocked(&self, final_url: &Url, document: &Html) -> bool {
        final_url
            .as_str()
            .starts_with("http://www.sogou.com/antispider")
            || document.select(&RESULTS_SELECTOR).next().is_none()
    }

    fn has_no_results(&self, document: &Html) -> bool {
        document
            .select(&NUM_TIPS_SELECTOR)
            .any(|tips| element_text(tips).contains("搜狗已为您找到约0条相关结果"))
    }
}
