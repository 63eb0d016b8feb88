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

static ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-pcurl]").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h3.res-title").unwrap());

/// 360 移动搜索（ajax 翻页接口）
pub struct SoMobileEngine {
    interval: Duration,
}

impl SoMobileEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl EngineAdapter for SoMobileEngine {
    fn engine_name(&self) -> &'static str {
        "360MOBILE"
    }

    fn base_url(&self) -> &'static str {
        "https://m.so.com/nextpage"
    }

    fn user_agent(&self) -> &'static str {
        "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/78.0.3904.108 Mobile Safari/537.36"
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("q", keyword.to_string()),
            ("src", "result_input".to_string()),
            ("srcg", "home_next".to_string()),
            ("pn", page.to_string()),
            ("ajax", "1".to_string()),
        ]
    }

    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&ITEM_SELECTOR).collect()
    }

    fn extract_item_url(&self, item: ElementRef<'_>, _page_url: &Url) -> UrlExtraction {
        match item.value().attr("data-pcurl") {
            Some(url) if !url.is_empty() => UrlExtraction::Direct(url.to_string()),
            _ => UrlExtraction::Skip,
        }
    }

    fn extract_item_title(&self, item: ElementRef<'_>) -> String {
        item.select(&TITLE_SELECTOR)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    /// ajax 片段里由内联脚本标记是否还有下一页
    fn has_next_page(&self, document: &Html) -> bool {
        page_has_text(document, "MSO.hasNextPage = true;")
    }

    fn is_blocked(&self, final_url: &Url, document: &Html) -> bool {
        page_has_text(document, "请输入验证码以便正常访问")
            || final_url.as_str().starts_with("http://qcaptcha.so.com/?ret=")
    }

    fn has_no_results(&self, document: &Html) -> bool {
        (page_has_text(document, "很抱歉搜索君没有找到与")
            && page_has_text(document, "检查输入是否正确"))
            || document.root_element().text().all(|text| text.trim().is_empty())
            || page_has_text(document, "MSO.hasNextPage = false;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SoMobileEngine {
        SoMobileEngine::new(Duration::from_secs(1))
    }

    #[test]
    fn test_items_from_pcurl_attribute() {
        let document = Html::parse_document(
            r#"<html><body>
            <div data-pcurl="http://a.com/1"><h3 class="res-title">甲</h3></div>
            <div data-pcurl="http://b.com/2"><h3 class="res-title">乙</h3></div>
            <script>MSO.hasNextPage = true;</script>
            </body></html>"#,
        );
        let engine = adapter();
        let items = engine.extract_items(&document);
        assert_eq!(items.len(), 2);
        let page_url = Url::parse("https://m.so.com/nextpage?q=x").unwrap();
        assert_eq!(
            engine.extract_item_url(items[0], &page_url),
            UrlExtraction::Direct("http://a.com/1".to_string())
        );
        assert_eq!(engine.extract_item_title(items[1]), "乙");
        assert!(engine.has_next_page(&document));
    }

    #[test]
    fn test_no_results_variants() {
        let engine = adapter();
        let copy = Html::parse_document(
            "<html><body><p>很抱歉搜索君没有找到与此相关的结果</p><p>检查输入是否正确</p></body></html>",
        );
        assert!(engine.has_no_results(&copy));

        let last_page = Html::parse_document(
            "<html><body><div data-pcurl='x'>y</div><script>MSO.hasNextPage = false;</script></body></html>",
        );
        assert!(engine.has_no_results(&last_page));

        let blank = Html::parse_document("<html><body>   </body></html>");
        assert!(engine.has_no_results(&blank));
    }

    #[test]
    fn test_blocked_on_captcha() {
        let engine = adapter();
        let page_url = Url::parse("https://m.so.com/nextpage?q=x").unwrap();
        let captcha =
            Html::parse_document("<html><body><p>请输入验证码以便正常访问</p></body></html>");
        assert!(engine.is_blocked(&page_url, &captcha));

        let redirect = Url::parse("http://qcaptcha.so.com/?ret=abc").unwrap();
        let empty = Html::parse_document("<html><body><p>x</p></body></html>");
        assert!(engine.is_blocked(&redirect, &empty));
    }
}
