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

static ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#content_left > div").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static PAGE_DIV_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#page a").unwrap());
static UNSAFE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.unsafe_content.f13").unwrap());

const NEXT_PAGE_TEXT: &str = "下一页 >";
/// 等待加载的验证码跳转；不一定是反爬判定，但处理方式相同
const CAPTCHA_PREFIX: &str = "https://wappass.baidu.com/static/captcha";

/// 百度 PC 搜索
pub struct BaiduPcEngine {
    interval: Duration,
}

impl BaiduPcEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    fn next_page_link<'a>(document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(&PAGE_DIV_LINK_SELECTOR)
            .find(|link| element_text(*link) == NEXT_PAGE_TEXT)
    }
}

impl EngineAdapter for BaiduPcEngine {
    fn engine_name(&self) -> &'static str {
        "百度PC"
    }

    fn base_url(&self) -> &'static str {
        "https://www.baidu.com/s"
    }

    fn user_agent(&self) -> &'static str {
        DESKTOP_USER_AGENT
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("wd", keyword.to_string()),
            ("pn", ((page - 1) * 10).to_string()),
        ]
    }

    /// content_left 的直接子 div，跳过相关搜索块
    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document
            .select(&ITEM_SELECTOR)
            .filter(|item| item.value().attr("id") != Some("rs_top_new"))
            .collect()
    }

    fn extract_item_url(&self, item: ElementRef<'_>, _page_url: &Url) -> UrlExtraction {
        let href = match item
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|link| link.value().attr("href"))
        {
            Some(href) => href,
            None => return UrlExtraction::Skip,
        };
        if href.starts_with("javascript") {
            UrlExtraction::Skip
        } else if href.starts_with("http://www.baidu.com/link?") {
            // 链接跟踪包装，目的地址在 Location 头里
            UrlExtraction::FollowRedirect(href.to_string())
        } else {
            UrlExtraction::Direct(href.to_string())
        }
    }

    fn extract_item_title(&self, item: ElementRef<'_>) -> String {
        item.select(&LINK_SELECTOR)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    fn has_next_page(&self, document: &Html) -> bool {
        document
            .select(&LINK_SELECTOR)
            .any(|link| element_text(link) == NEXT_PAGE_TEXT)
    }

    /// 页码参数翻页在深页不可靠，跟随页面给出的下一页地址
    fn next_page_url(&self, document: &Html) -> Option<String> {
        let href = Self::next_page_link(document)?.value().attr("href")?;
        Url::parse(self.base_url())
            .ok()?
            .join(href)
            .ok()
            .map(|url| url.to_string())
    }

    fn is_blocked(&self, final_url: &Url, _document: &Html) -> bool {
        final_url.as_str().starts_with(CAPTCHA_PREFIX)
    }

    fn has_no_results(&self, document: &Html) -> bool {
        page_has_text(document, "很抱歉，没有找到与")
            && page_has_text(document, "请检查您的输入是否正确")
    }

    fn is_unsafe_listing(&self, item: ElementRef<'_>) -> bool {
        item.select(&UNSAFE_SELECTOR).next().is_some()
    }
}
