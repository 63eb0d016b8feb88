// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::search::{EngineAdapter, UrlExtraction};
use crate::infrastructure::search::{element_text, MOBILE_USER_AGENT};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

static RESULT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.vrResult").unwrap());
static RESULT_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.resultLink").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static PAGE_INFO_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static BTN_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.btn a").unwrap());
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// 中转页（转码页）的地址前缀，真实地址藏在页面里
const WRAPPER_PREFIXES: [&str; 3] = [
    "http://wap.sogou.com/transcoding/sweb",
    "http://m.sogou.com/transcoding/sweb",
    "http://wap.sogou.com/web/search/",
];

/// 搜狗移动搜索（ajax 接口）
pub struct SogouMobileEngine {
    interval: Duration,
}

impl SogouMobileEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// 首个 `<p>` 节点里的翻页计数，形如 "30,10,1,0[PAGE_INFO]"
    fn page_info(document: &Html) -> Vec<String> {
        document
            .select(&PAGE_INFO_SELECTOR)
            .next()
            .and_then(|p| p.text().next())
            .map(|text| text.trim().split(',').map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl EngineAdapter for SogouMobileEngine {
    fn engine_name(&self) -> &'static str {
        "搜狗MOBILE"
    }

    fn base_url(&self) -> &'static str {
        "http://wap.sogou.com/web/search/ajax_query.jsp"
    }

    fn user_agent(&self) -> &'static str {
        MOBILE_USER_AGENT
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![("keyword", keyword.to_string()), ("p", page.to_string())]
    }

    /// 条目是 vrResult 里的链接本身，优先 resultLink，没有地址的整条跳过
    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document
            .select(&RESULT_SELECTOR)
            .filter_map(|result| {
                result
                    .select(&RESULT_LINK_SELECTOR)
                    .next()
                    .or_else(|| result.select(&LINK_SELECTOR).next())
                    .filter(|link| link.value().attr("href").is_some())
            })
            .collect()
    }

    fn extract_item_url(&self, item: ElementRef<'_>, page_url: &Url) -> UrlExtraction {
        let href = match item.value().attr("href") {
            Some(href) => href,
            None => return UrlExtraction::Skip,
        };
        if href.starts_with("javascript") {
            return UrlExtraction::Skip;
        }
        if href.starts_with("http") {
            return UrlExtraction::Direct(href.to_string());
        }
        // 相对地址：先对页面地址解析，再看查询串里有没有明文目的地址
        let joined = match page_url.join(href) {
            Ok(joined) => joined,
            Err(_) => return UrlExtraction::Skip,
        };
        if let Some((_, value)) = joined.query_pairs().find(|(key, _)| key == "url") {
            return UrlExtraction::Direct(value.into_owned());
        }
        UrlExtraction::FollowWrapper(joined.to_string())
    }

    fn extract_wrapped_url(&self, final_url: &Url, document: &Html) -> Option<String> {
        if WRAPPER_PREFIXES
            .iter()
            .any(|prefix| final_url.as_str().starts_with(prefix))
        {
            // 转码页里有一个确认按钮指向原始页面；个别页面没有 btn 容器，
            // 退而取第一个链接
            document
                .select(&BTN_LINK_SELECTOR)
                .next()
                .or_else(|| document.select(&LINK_SELECTOR).next())
                .and_then(|link| link.value().attr("href"))
                .map(str::to_string)
        } else {
            Some(final_url.to_string())
        }
    }

    fn extract_item_title(&self, item: ElementRef<'_>) -> String {
        element_text(item)
    }

    fn has_next_page(&self, document: &Html) -> bool {
        let info = Self::page_info(document);
        match (
            info.first().and_then(|n| n.parse::<i64>().ok()),
            info.get(1).and_then(|n| n.parse::<i64>().ok()),
        ) {
            (Some(total), Some(shown)) => total > shown,
            _ => false,
        }
    }

    fn is_blocked(&self, _final_url: &Url, document: &Html) -> bool {
        let body = match document.select(&BODY_SELECTOR).next() {
            Some(body) => body,
            None => return true,
        };
        match body.child_elements().next() {
            Some(first) => first.text().any(|text| text.trim() == "403"),
            None => false,
        }
    }

    fn has_no_results(&self, document: &Html) -> bool {
        Self::page_info(document)
            .get(3)
            .map(|flag| flag == "0[PAGE_INFO]")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SogouMobileEngine {
        SogouMobileEngine::new(Duration::from_secs(1))
    }

    fn page_url() -> Url {
        Url::parse("http://wap.sogou.com/web/search/ajax_query.jsp?keyword=x&p=1").unwrap()
    }

    #[test]
    fn test_extract_items_prefers_result_link() {
        let document = Html::parse_document(
            r#"<html><body>
            <div class="vrResult"><a href="/web/x?y=1">普通</a><a class="resultLink" href="http://real.com/">真实</a></div>
            <div class="vrResult"><a>没有地址</a></div>
            <p>30,10,1,1[PAGE_INFO]</p>
            </body></html>"#,
        );
        let engine = adapter();
        let items = engine.extract_items(&document);
        assert_eq!(items.len(), 1);
        assert_eq!(
            engine.extract_item_url(items[0], &page_url()),
            UrlExtraction::Direct("http://real.com/".to_string())
        );
    }

    #[test]
    fn test_relative_href_with_url_param_is_unwrapped() {
        let document = Html::parse_document(
            r#"<html><body>
            <div class="vrResult"><a href="/web/jump?url=http%3A%2F%2Ftarget.cn%2Fpage&k=1">条目</a></div>
            </body></html>"#,
        );
        let engine = adapter();
        let items = engine.extract_items(&document);
        assert_eq!(
            engine.extract_item_url(items[0], &page_url()),
            UrlExtraction::Direct("http://target.cn/page".to_string())
        );
    }

    #[test]
    fn test_relative_href_without_url_param_follows_wrapper() {
        let document = Html::parse_document(
            r#"<html><body>
            <div class="vrResult"><a href="/web/opaque?id=9">条目</a></div>
            </body></html>"#,
        );
        let engine = adapter();
        let items = engine.extract_items(&document);
        assert_eq!(
            engine.extract_item_url(items[0], &page_url()),
            UrlExtraction::FollowWrapper(
                "http://wap.sogou.com/web/opaque?id=9".to_string()
            )
        );
    }

    #[test]
    fn test_wrapped_url_from_transcoding_page() {
        let engine = adapter();
        let wrapper_url = Url::parse("http://wap.sogou.com/transcoding/sweb?u=abc").unwrap();
        let with_btn = Html::parse_document(
            r#"<html><body><div class="btn"><a href="http://origin.com/page">继续访问</a></div></body></html>"#,
        );
        assert_eq!(
            engine.extract_wrapped_url(&wrapper_url, &with_btn),
            Some("http://origin.com/page".to_string())
        );

        // 个别页面没有 btn 容器
        let without_btn = Html::parse_document(
            r#"<html><body><a href="http://origin.com/other">链接</a></body></html>"#,
        );
        assert_eq!(
            engine.extract_wrapped_url(&wrapper_url, &without_btn),
            Some("http://origin.com/other".to_string())
        );

        // 非转码页：直接用最终地址
        let elsewhere = Url::parse("http://target.cn/landed").unwrap();
        assert_eq!(
            engine.extract_wrapped_url(&elsewhere, &without_btn),
            Some("http://target.cn/landed".to_string())
        );
    }

    #[test]
    fn test_page_info_pagination_and_no_results() {
        let engine = adapter();
        let more = Html::parse_document("<html><body><p>30,10,1,1[PAGE_INFO]</p></body></html>");
        assert!(engine.has_next_page(&more));
        assert!(!engine.has_no_results(&more));

        let done = Html::parse_document("<html><body><p>10,10,1,1[PAGE_INFO]</p></body></html>");
        assert!(!engine.has_next_page(&done));

        let empty =
            Html::parse_document("<html><body><p>0,0,1,0[PAGE_INFO]</p></body></html>");
        assert!(engine.has_no_results(&empty));

        // 结构缺失时不误报
        let garbage = Html::parse_document("<html><body><div>x</div></body></html>");
        assert!(!engine.has_next_page(&garbage));
        assert!(!engine.has_no_results(&garbage));
    }

    #[test]
    fn test_blocked_on_403_stub() {
        let engine = adapter();
        let url = Url::parse("http://wap.sogou.com/web/search/ajax_query.jsp").unwrap();
        let forbidden =
            Html::parse_document("<html><body><div> 403 </div></body></html>");
        assert!(engine.is_blocked(&url, &forbidden));
        let normal = Html::parse_document("<html><body><div>正常内容</div></body></html>");
        assert!(!engine.is_blocked(&url, &normal));
    }
}
