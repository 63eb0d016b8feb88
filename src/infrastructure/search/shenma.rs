// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::search::{EngineAdapter, UrlExtraction};
use crate::infrastructure::search::{element_text, page_has_text, DESKTOP_USER_AGENT};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

static ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.ali_row").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static NEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.next").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

/// 神马搜索
pub struct ShenmaEngine {
    interval: Duration,
}

impl ShenmaEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl EngineAdapter for ShenmaEngine {
    fn engine_name(&self) -> &'static str {
        "神马"
    }

    fn base_url(&self) -> &'static str {
        "https://m.sm.cn/s"
    }

    fn user_agent(&self) -> &'static str {
        DESKTOP_USER_AGENT
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("q", keyword.to_string()),
            ("page", page.to_string()),
            ("by", "next".to_string()),
            ("from", "smor".to_string()),
            ("tomode", "center".to_string()),
            ("safe", "1".to_string()),
        ]
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

    fn is_blocked(&self, _final_url: &Url, document: &Html) -> bool {
        document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|title| element_text(title) == "验证码拦截")
            .unwrap_or(false)
    }

    fn has_no_results(&self, document: &Html) -> bool {
        page_has_text(document, "1. 看看输入的文字是否有误")
            && page_has_text(document, "2. 去掉可能不必要的字词，如\"的\"、\"什么\"等")
    }
}
