// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 请求管道：步调控制、重试与页面分类
//!
//! 三类失败严格区分，绝不混同：
//! - 网络瞬断（连接重置/拒绝/传输截断）：无限重试，从不上抛；
//! - 反爬拦截（验证码页、拦截跳转、空 body）：带退避无限重试，从不上抛；
//! - 无法归类的空结果页：有限重试，超出预算升级为致命提取错误，
//!   页面落盘后交由人工分析。

use crate::config::settings::CrawlSettings;
use crate::domain::repositories::Workspace;
use crate::domain::search::{EngineAdapter, SpiderError};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// 一次成功抓取的结果页
#[derive(Debug)]
pub struct FetchedPage {
    /// 跟随跳转后的最终地址
    pub final_url: Url,
    pub document: Html,
    /// 引擎明确表示零结果（结果条目为空但属于正常完成）
    pub no_results: bool,
}

impl FetchedPage {
    /// 页面里的有序结果条目
    pub fn items<'a>(&'a self, adapter: &dyn EngineAdapter) -> Vec<scraper::ElementRef<'a>> {
        adapter.extract_items(&self.document)
    }
}

/// 单引擎的请求管道
///
/// 所有可变运行状态（上次请求时间、最近一次响应）由管道独占，
/// 整个运行严格串行，同一时刻只有一个在途请求。
pub struct RequestPipeline<'a> {
    adapter: &'a dyn EngineAdapter,
    workspace: &'a dyn Workspace,
    client: Client,
    head_client: Client,
    reconnect_interval: Duration,
    error_interval: Duration,
    max_empty_retries: u32,
    last_request: Option<Instant>,
    /// 最近一次实际请求到的地址，致命错误时写入诊断日志
    pub last_url: String,
    /// 最近一次响应的内容
    pub last_body: String,
}

impl<'a> RequestPipeline<'a> {
    pub fn new(
        adapter: &'a dyn EngineAdapter,
        workspace: &'a dyn Workspace,
        crawl: &CrawlSettings,
    ) -> Result<Self, SpiderError> {
        let client = build_client(adapter)?;
        let head_client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SpiderError::Client(e.to_string()))?;
        Ok(Self {
            adapter,
            workspace,
            client,
            head_client,
            reconnect_interval: Duration::from_secs_f64(crawl.reconnect_interval_secs),
            error_interval: Duration::from_secs_f64(crawl.error_interval_secs),
            max_empty_retries: crawl.max_empty_retries,
            last_request: None,
            last_url: String::new(),
            last_body: String::new(),
        })
    }

    /// 丢弃当前会话的 Cookie，重建客户端
    ///
    /// 每个关键词开始前调用一次；无会话引擎本来就不携带状态，无需重建。
    pub fn reset_session(&mut self) -> Result<(), SpiderError> {
        if self.adapter.uses_session() {
            self.client = build_client(self.adapter)?;
        }
        Ok(())
    }

    /// 抓取并分类一页搜索结果
    ///
    /// `page_url` 有值时原样请求该地址（页码查询不可靠的引擎），
    /// 否则用适配器构造的查询参数请求 base_url。
    /// 关键词和页码只用于异常页面转储的命名。
    pub async fn fetch_page(
        &mut self,
        keyword: &str,
        page: u32,
        page_url: Option<&str>,
    ) -> Result<FetchedPage, SpiderError> {
        self.pace().await;
        let mut empty_failures = 0u32;
        loop {
            let (final_url, body) = match self.send_get(keyword, page, page_url).await {
                Some(ok) => ok,
                None => continue,
            };
            let document = Html::parse_document(&body);

            if body_is_missing(&document) || self.adapter.is_blocked(&final_url, &document) {
                warn!(
                    "该IP已被判定为爬虫，暂时无法获取到信息，{}秒之后尝试重新抓取",
                    self.error_interval.as_secs_f64()
                );
                sleep(self.error_interval).await;
                continue;
            }

            if !self.adapter.extract_items(&document).is_empty() {
                self.mark_request_done();
                return Ok(FetchedPage {
                    final_url,
                    document,
                    no_results: false,
                });
            }

            if self.adapter.has_no_results(&document) {
                // 确认的零结果是完成的查询，不算失败
                self.mark_request_done();
                return Ok(FetchedPage {
                    final_url,
                    document,
                    no_results: true,
                });
            }

            if self.adapter.should_retry_page(&document) {
                // 已知的瞬态渲染，重试不消耗失败预算
                debug!("结果容器为空但属于已知瞬态情况，{}秒之后重试", self.error_interval.as_secs_f64());
                sleep(self.error_interval).await;
                continue;
            }

            empty_failures += 1;
            self.dump_anomalous_page(keyword, page, &final_url, &body)?;
            if empty_failures > self.max_empty_retries {
                return Err(SpiderError::ExtractionExhausted {
                    engine: self.adapter.engine_name(),
                    keyword: keyword.to_string(),
                    page,
                    attempts: empty_failures,
                });
            }
            warn!(
                "请求页面内容异常，可能是被认定为是爬虫，{}秒之后尝试重新抓取",
                self.error_interval.as_secs_f64()
            );
            sleep(self.error_interval).await;
        }
    }

    /// 抓取任意地址（条目地址解析用的中转页）
    ///
    /// 与 `fetch_page` 相同的步调/断网/拦截处理，但不做结果条目分类。
    pub async fn fetch_raw(&mut self, url: &str) -> Result<(Url, Html), SpiderError> {
        self.pace().await;
        loop {
            let (final_url, body) = match self.send_get_url(url).await {
                Some(ok) => ok,
                None => continue,
            };
            let document = Html::parse_document(&body);
            if body_is_missing(&document) || self.adapter.is_blocked(&final_url, &document) {
                warn!(
                    "该IP已被判定为爬虫，暂时无法获取到信息，{}秒之后尝试重新抓取",
                    self.error_interval.as_secs_f64()
                );
                sleep(self.error_interval).await;
                continue;
            }
            self.mark_request_done();
            return Ok((final_url, document));
        }
    }

    /// 解开链接跟踪包装：HEAD 请求读取 Location 头
    pub async fn resolve_redirect(&mut self, url: &str) -> Result<String, SpiderError> {
        self.pace().await;
        loop {
            let response = match self
                .head_client
                .head(url)
                .header("User-Agent", self.adapter.user_agent())
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    warn!(
                        "检查到网络断开，{}秒之后尝试重新抓取：{}",
                        self.reconnect_interval.as_secs_f64(),
                        error
                    );
                    sleep(self.reconnect_interval).await;
                    continue;
                }
            };
            let response_url = response.url().clone();
            if self
                .adapter
                .is_blocked(&response_url, &Html::parse_document(""))
            {
                warn!(
                    "该IP已被判定为爬虫，暂时无法获取到信息，{}秒之后尝试重新抓取",
                    self.error_interval.as_secs_f64()
                );
                sleep(self.error_interval).await;
                continue;
            }
            self.mark_request_done();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| SpiderError::MissingRedirect(url.to_string()))?;
            // Location 可能是相对地址
            return Ok(response_url
                .join(location)
                .map(|joined| joined.to_string())
                .unwrap_or_else(|_| location.to_string()));
        }
    }

    /// 距上次请求不足引擎间隔时补足等待
    async fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let interval = self.adapter.request_interval();
            let elapsed = last.elapsed();
            if elapsed < interval {
                sleep(interval - elapsed).await;
            }
        }
    }

    fn mark_request_done(&mut self) {
        self.last_request = Some(Instant::now());
    }

    /// 发出 SERP GET；网络瞬断时退避并返回 None 让调用方重试
    async fn send_get(
        &mut self,
        keyword: &str,
        page: u32,
        page_url: Option<&str>,
    ) -> Option<(Url, String)> {
        match page_url {
            Some(url) => self.send_get_url(url).await,
            None => {
                let params = self.adapter.query_params(keyword, page);
                let request = self.client.get(self.adapter.base_url()).query(&params);
                self.send(request).await
            }
        }
    }

    async fn send_get_url(&mut self, url: &str) -> Option<(Url, String)> {
        let request = self.client.get(url);
        self.send(request).await
    }

    async fn send(&mut self, request: reqwest::RequestBuilder) -> Option<(Url, String)> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    "检查到网络断开，{}秒之后尝试重新抓取：{}",
                    self.reconnect_interval.as_secs_f64(),
                    error
                );
                sleep(self.reconnect_interval).await;
                return None;
            }
        };
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            // 读取 body 途中断开（传输截断）同样按网络瞬断处理
            Err(error) => {
                warn!(
                    "检查到网络断开，{}秒之后尝试重新抓取：{}",
                    self.reconnect_interval.as_secs_f64(),
                    error
                );
                sleep(self.reconnect_interval).await;
                return None;
            }
        };
        let body = decode_body(&bytes, content_type.as_deref());
        self.last_url = final_url.to_string();
        self.last_body = body.clone();
        Some((final_url, body))
    }

    /// 把无法归类的空页落盘，供离线分析
    fn dump_anomalous_page(
        &self,
        keyword: &str,
        page: u32,
        final_url: &Url,
        body: &str,
    ) -> Result<(), SpiderError> {
        let filename = format!(
            "新型爬虫返回页_可以发送给开发进行分析_{}-{}-{}.html",
            self.adapter.engine_name(),
            keyword,
            page
        );
        self.workspace
            .write_text(&filename, &format!("{}\n{}", final_url, body))
    }
}

/// 按适配器的请求头约定构建客户端
///
/// 带会话的引擎启用 Cookie 存储；每次调用都得到全新的 Cookie 罐。
fn build_client(adapter: &dyn EngineAdapter) -> Result<Client, SpiderError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3",
        ),
    );
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert(
        "Upgrade-Insecure-Requests",
        HeaderValue::from_static("1"),
    );
    headers.insert(
        "User-Agent",
        HeaderValue::from_str(adapter.user_agent())
            .map_err(|e| SpiderError::Client(e.to_string()))?,
    );

    Client::builder()
        .default_headers(headers)
        .cookie_store(adapter.uses_session())
        .timeout(Duration::from_secs(30))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| SpiderError::Client(e.to_string()))
}

/// body 缺失或没有任何内容的文档与拦截页同等对待
fn body_is_missing(document: &Html) -> bool {
    match document.select(&BODY_SELECTOR).next() {
        Some(body) => body.children().next().is_none(),
        None => true,
    }
}

/// 按响应头字符集解码，缺失时探测（这些引擎常用 GBK），兜底 UTF-8
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some(label) = content_type.and_then(charset_label) {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return encoding.decode(bytes).0.into_owned();
        }
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true).decode(bytes).0.into_owned()
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("charset="))
        .map(|label| label.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_label() {
        assert_eq!(
            charset_label("text/html; charset=gbk"),
            Some("gbk".to_string())
        );
        assert_eq!(
            charset_label("text/html; charset=\"UTF-8\""),
            Some("UTF-8".to_string())
        );
        assert_eq!(charset_label("text/html"), None);
    }

    #[test]
    fn test_decode_body_gbk() {
        let text = "搜狗已为您找到约一千万条相关结果，这里是一段用于编码处理的较长示例文本，包含标点符号、数字 12345 和换行。";
        let (encoded, _, _) = encoding_rs::GBK.encode(text);
        assert_eq!(decode_body(&encoded, Some("text/html; charset=gbk")), text);
        // 没有字符集头时靠探测
        assert_eq!(decode_body(&encoded, None), text);
    }

    #[test]
    fn test_body_is_missing() {
        assert!(body_is_missing(&Html::parse_document("")));
        assert!(body_is_missing(&Html::parse_document(
            "<html><body></body></html>"
        )));
        assert!(!body_is_missing(&Html::parse_document(
            "<html><body><p>hi</p></body></html>"
        )));
    }
}
