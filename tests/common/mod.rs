#![allow(dead_code)]

use rankspider::config::Settings;
use rankspider::domain::search::{EngineAdapter, UrlExtraction};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

static ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.results > div.item").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static NEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.next").unwrap());
static RETRY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.retry").unwrap());

/// 测试用适配器：极简的固定标记约定
///
/// 结果页：`<div class="results"><div class="item"><a href="...">标题</a></div>...</div>`
/// 拦截页含「安全验证」文案；零结果页含「没有找到相关结果」；
/// `div.retry` 表示已知瞬态空页。
pub struct TestAdapter {
    base_url: &'static str,
}

impl TestAdapter {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: Box::leak(base_url.into_boxed_str()),
        }
    }
}

impl EngineAdapter for TestAdapter {
    fn engine_name(&self) -> &'static str {
        "测试引擎"
    }

    fn base_url(&self) -> &'static str {
        self.base_url
    }

    fn user_agent(&self) -> &'static str {
        "rankspider-test/1.0"
    }

    fn request_interval(&self) -> Duration {
        Duration::ZERO
    }

    fn uses_session(&self) -> bool {
        false
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![("q", keyword.to_string()), ("p", page.to_string())]
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
            .map(|link| link.text().collect())
            .unwrap_or_default()
    }

    fn has_next_page(&self, document: &Html) -> bool {
        document.select(&NEXT_SELECTOR).next().is_some()
    }

    fn is_blocked(&self, _final_url: &Url, document: &Html) -> bool {
        document
            .root_element()
            .text()
            .any(|text| text.contains("安全验证"))
    }

    fn has_no_results(&self, document: &Html) -> bool {
        document
            .root_element()
            .text()
            .any(|text| text.contains("没有找到相关结果"))
    }

    fn should_retry_page(&self, document: &Html) -> bool {
        document.select(&RETRY_SELECTOR).next().is_some()
    }

    fn is_unsafe_listing(&self, item: ElementRef<'_>) -> bool {
        item.value().classes().any(|class| class == "unsafe")
    }
}

/// 测试用配置：退避间隔压到毫秒级
pub fn fast_settings() -> Settings {
    let mut settings = Settings::with_file("config/nonexistent").unwrap();
    settings.crawl.reconnect_interval_secs = 0.01;
    settings.crawl.error_interval_secs = 0.01;
    settings
}

/// 一页结果的标记
pub fn serp_page(items: &[&str], has_next: bool) -> String {
    let items_html: String = items
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"<div class="item"><a href="{}">第{}条结果</a></div>"#,
                url,
                i + 1
            )
        })
        .collect();
    let next = if has_next {
        r#"<a class="next" href="?p=2">下一页</a>"#
    } else {
        ""
    };
    format!(
        "<html><body><div class=\"results\">{}</div>{}</body></html>",
        items_html, next
    )
}

pub fn no_results_page() -> String {
    "<html><body><p>没有找到相关结果</p></body></html>".to_string()
}

pub fn blocked_page() -> String {
    "<html><body><p>安全验证</p></body></html>".to_string()
}

pub fn anomalous_empty_page() -> String {
    "<html><body><p>页面结构变了</p></body></html>".to_string()
}

pub fn retry_page() -> String {
    r#"<html><body><div class="results"></div><div class="retry"></div></body></html>"#.to_string()
}
