// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::search::{EngineAdapter, UrlExtraction};
use crate::infrastructure::search::{element_text, page_has_text, MOBILE_USER_AGENT};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

static ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#results div.c-result.result").unwrap());
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.c-title-text").unwrap());
static NEXT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.new-nextpage-only, a.new-nextpage").unwrap());
static PAGE_HD_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#page-hd").unwrap());
static PAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#page").unwrap());

/// 已知的破损 data-log 形态里抢救 mu 字段
static MU_FALLBACK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'mu':'(.*?)''").unwrap());

const CAPTCHA_PREFIX: &str = "https://wappass.baidu.com/static/captcha";

/// 条目 data-log 属性里的真实地址
///
/// 属性值是单引号的字典字面量。先做结构化解析（归一成 JSON），
/// 失败则用正则从已知的破损形态里提取，再不行放弃该条目。
fn parse_data_log_mu(data_log: &str) -> Option<String> {
    let normalized = data_log.replace('\'', "\"");
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&normalized) {
        if let Some(mu) = value.get("mu").and_then(|mu| mu.as_str()) {
            if !mu.is_empty() {
                return Some(mu.to_string());
            }
        }
        return None;
    }
    MU_FALLBACK_RE
        .captures(data_log)
        .and_then(|captures| captures.get(1))
        .map(|mu| mu.as_str().to_string())
}

/// 百度移动搜索
pub struct BaiduMobileEngine {
    interval: Duration,
}

impl BaiduMobileEngine {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl EngineAdapter for BaiduMobileEngine {
    fn engine_name(&self) -> &'static str {
        "百度MOBILE"
    }

    fn base_url(&self) -> &'static str {
        "https://m.baidu.com/s"
    }

    fn user_agent(&self) -> &'static str {
        MOBILE_USER_AGENT
    }

    fn request_interval(&self) -> Duration {
        self.interval
    }

    fn query_params(&self, keyword: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("word", keyword.to_string()),
            ("pn", ((page - 1) * 10).to_string()),
        ]
    }

    fn extract_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&ITEM_SELECTOR).collect()
    }

    fn extract_item_url(&self, item: ElementRef<'_>, _page_url: &Url) -> UrlExtraction {
        match item
            .value()
            .attr("data-log")
            .and_then(parse_data_log_mu)
        {
            Some(mu) => UrlExtraction::Direct(mu),
            None => UrlExtraction::Skip,
        }
    }

    fn extract_item_title(&self, item: ElementRef<'_>) -> String {
        item.select(&TITLE_SELECTOR)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    fn has_next_page(&self, document: &Html) -> bool {
        document.select(&NEXT_SELECTOR).next().is_some()
    }

    fn next_page_url(&self, document: &Html) -> Option<String> {
        let href = document
            .select(&NEXT_SELECTOR)
            .next()?
            .value()
            .attr("href")?;
        Url::parse(self.base_url())
            .ok()?
            .join(href)
            .ok()
            .map(|url| url.to_string())
    }

    /// 验证码跳转，或页面骨架只渲染了头部没有结果区
    fn is_blocked(&self, final_url: &Url, document: &Html) -> bool {
        final_url.as_str().starts_with(CAPTCHA_PREFIX)
            || (document.select(&PAGE_HD_SELECTOR).next().is_some()
                && document.select(&PAGE_SELECTOR).next().is_none())
    }

    fn has_no_results(&self, document: &Html) -> bool {
        page_has_text(document, "检查输入是否正确")
            && page_has_text(document, "抱歉，没有找到与")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> BaiduMobileEngine {
        BaiduMobileEngine::new(Duration::from_secs(1))
    }

    #[test]
    fn test_parse_data_log_structured() {
        assert_eq!(
            parse_data_log_mu("{'order':1,'mu':'https://target.com/page'}"),
            Some("https://target.com/page".to_string())
        );
        // mu 为空串视为没有地址
        assert_eq!(parse_data_log_mu("{'order':1,'mu':''}"), None);
        assert_eq!(parse_data_log_mu("{'order':1}"), None);
    }

    #[test]
    fn test_parse_data_log_fallback_regex() {
        // 已知的破损形态：mu 值后面跟了两个引号，结构化解析必然失败
        let broken = "{'order':2,'mu':'https://target.com/b''}";
        assert_eq!(
            parse_data_log_mu(broken),
            Some("https://target.com/b".to_string())
        );
        assert_eq!(parse_data_log_mu("complete garbage"), None);
    }

    #[test]
    fn test_extract_items_and_urls() {
        let document = Html::parse_document(
            r#"<html><body><div id="results">
            <div class="c-result result" data-log="{'mu':'https://a.com/1'}">
              <span class="c-title-text">标题<!--x-->一</span></div>
            <div class="c-result result"><span class="c-title-text">没有地址</span></div>
            </div></body></html>"#,
        );
        let engine = adapter();
        let items = engine.extract_items(&document);
        assert_eq!(items.len(), 2);
        let page_url = Url::parse("https://m.baidu.com/s?word=x").unwrap();
        assert_eq!(
            engine.extract_item_url(items[0], &page_url),
            UrlExtraction::Direct("https://a.com/1".to_string())
        );
        assert_eq!(engine.extract_item_url(items[1], &page_url), UrlExtraction::Skip);
        assert_eq!(engine.extract_item_title(items[0]), "标题一");
    }

    #[test]
    fn test_blocked_when_header_without_results() {
        let engine = adapter();
        let url = Url::parse("https://m.baidu.com/s?word=x").unwrap();
        let skeleton = Html::parse_document(
            r#"<html><body><div id="page-hd">头部</div></body></html>"#,
        );
        assert!(engine.is_blocked(&url, &skeleton));
        let complete = Html::parse_document(
            r#"<html><body><div id="page-hd">头部</div><div id="page">内容</div></body></html>"#,
        );
        assert!(!engine.is_blocked(&url, &complete));
    }

    #[test]
    fn test_next_page_follows_opaque_url() {
        let document = Html::parse_document(
            r#"<html><body><a class="new-nextpage" href="/s?word=x&pn=10&t=1">下一页</a></body></html>"#,
        );
        let engine = adapter();
        assert!(engine.has_next_page(&document));
        assert_eq!(
            engine.next_page_url(&document),
            Some("https://m.baidu.com/s?word=x&pn=10&t=1".to_string())
        );
    }
}
