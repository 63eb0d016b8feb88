// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::search::{EngineAdapter, UrlExtraction};
use crate::infrastructure::search::{element_text, page_has_text};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

static ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-res]").unwrap());
static NEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a#snext").unwrap());
static RESULT_LIST_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.result").unwrap());

/// 真实地址可能挂在这几个属性上，按优先级取第一个
const URL_ATTRS: [&str; 4] = ["data-mdurl", "data-cache", "data-url", "href"];

/// 360 PC 搜索
pub struct SoPcEngine {
    interval: Duration,
}

impl SoPcEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl EngineAdapter for SoPcEngine {
    fn engine_name(&self) -> &'static str {
        "360PC"
    }

    fn base_url(&self) -> &'static str {
        "https://www.so.com/s"
    }

    fn user_agent(&self) -> &'static str {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/78.0.3904.108 Safari/537.36"
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("q", keyword.to_string()),
            ("pn", page.to_string()),
            ("src", "srp_paging".to_string()),
        ]
    }

    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&ITEM_SELECTOR).collect()
    }

    fn extract_item_url(&self, item: ElementRef<'_>, _page_url: &Url) -> UrlExtraction {
        for attr in URL_ATTRS {
            if let Some(url) = item.value().attr(attr) {
                if !url.is_empty() {
                    return UrlExtraction::Direct(url.to_string());
                }
            }
        }
        UrlExtraction::Skip
    }

    fn extract_item_title(&self, item: ElementRef<'_>) -> String {
        element_text(item)
    }

    fn has_next_page(&self, document: &Html) -> bool {
        document.select(&NEXT_SELECTOR).next().is_some()
    }

    fn is_blocked(&self, _final_url: &Url, document: &Html) -> bool {
        page_has_text(document, "亲，系统检测到您操作过于频繁。")
    }

    fn has_no_results(&self, document: &Html) -> bool {
        page_has_text(document, "检查输入是否正确")
            && page_has_text(document, "简化查询词或尝试其他相关词")
    }

    /// 结果列表渲染出来了但没有条目，重试通常就有了
    fn should_retry_page(&self, document: &Html) -> bool {
        document.select(&RESULT_LIST_SELECTOR).next().is_some()
            && self.extract_items(document).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SoPcEngine {
        SoPcEngine::new(Duration::from_secs(1))
    }

    #[test]
    fn test_url_attribute_cascade() {
        let document = Html::parse_document(
            r#"<html><body><ul class="result">
            <li data-res="1" data-mdurl="http://md.com/" data-url="http://ignored.com/">甲</li>
            <li data-res="1" data-cache="http://cache.com/">乙</li>
            <li data-res="1" href="http://href.com/">丙</li>
            <li data-res="1">丁</li>
            </ul></body></html>"#,
        );
        let engine = adapter();
        let items = engine.extract_items(&document);
        assert_eq!(items.len(), 4);
        let page_url = Url::parse("https://www.so.com/s?q=x").unwrap();
        assert_eq!(
            engine.extract_item_url(items[0], &page_url),
            UrlExtraction::Direct("http://md.com/".to_string())
        );
        assert_eq!(
            engine.extract_item_url(items[1], &page_url),
            UrlExtraction::Direct("http://cache.com/".to_string())
        );
        assert_eq!(
            engine.extract_item_url(items[2], &page_url),
            UrlExtraction::Direct("http://href.com/".to_string())
        );
        assert_eq!(engine.extract_item_url(items[3], &page_url), UrlExtraction::Skip);
    }

    #[test]
    fn test_retry_on_rendered_but_empty_list() {
        let engine = adapter();
        let empty_list =
            Html::parse_document(r#"<html><body><ul class="result"></ul></body></html>"#);
        assert!(engine.should_retry_page(&empty_list));

        let with_items = Html::parse_document(
            r#"<html><body><ul class="result"><li data-res="1" href="http://a.com">x</li></ul></body></html>"#,
        );
        assert!(!engine.should_retry_page(&with_items));

        // 连列表都没有：交给无法归类的空页处理
        let no_list = Html::parse_document("<html><body><p>x</p></body></html>");
        assert!(!engine.should_retry_page(&no_list));
    }

    #[test]
    fn test_blocked_copy() {
        let engine = adapter();
        let url = Url::parse("https://www.so.com/s?q=x").unwrap();
        let blocked = Html::parse_document(
            "<html><body><p>亲，系统检测到您操作过于频繁。</p></body></html>",
        );
        assert!(engine.is_blocked(&url, &blocked));
    }
}
