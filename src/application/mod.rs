// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod check_spider;
pub mod rank_spider;
pub mod scheduler;
pub mod site_spider;

use crate::config::GroupingMode;
use crate::domain::repositories::Row;
use crate::domain::search::{EngineAdapter, SpiderError, UrlExtraction};
use crate::infrastructure::http::RequestPipeline;
use scraper::ElementRef;
use url::Url;

pub use check_spider::CheckSpider;
pub use rank_spider::RankSpider;
pub use site_spider::SiteSpider;

/// 三种爬虫流程的统一入口，调度器和中断处理只认识这个接口
pub trait SpiderTask {
    /// 完整执行一轮查询
    async fn run_once(&mut self) -> Result<(), SpiderError>;

    /// 把当前批次已积累的记录落盘；中断和致命错误时调用
    fn flush(&mut self) -> Result<(), SpiderError>;

    /// 最近一次请求的地址和响应内容，写诊断日志用
    fn last_request(&self) -> (&str, &str);
}

/// 一个关键词与它的目标域名集合，域名按发现顺序排列
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTargets {
    pub keyword: String,
    pub domains: Vec<String>,
}

/// 把（域名，关键词）对按配置的模式分组
///
/// 显式配对：每行一个关键词配一个域名，多行累积；交叉对照：所有
/// 关键词对所有域名。关键词与域名都按首次出现的顺序保序去重。
pub fn group_pairs(
    pairs: impl IntoIterator<Item = (Option<String>, Option<String>)>,
    mode: GroupingMode,
) -> Vec<KeywordTargets> {
    match mode {
        GroupingMode::ExplicitPairs => {
            let mut groups: Vec<KeywordTargets> = Vec::new();
            for (domain, keyword) in pairs {
                let (domain, keyword) = match (domain, keyword) {
                    (Some(domain), Some(keyword)) => (domain, keyword),
                    _ => continue,
                };
                match groups.iter_mut().find(|group| group.keyword == keyword) {
                    Some(group) => {
                        if !group.domains.contains(&domain) {
                            group.domains.push(domain);
                        }
                    }
                    None => groups.push(KeywordTargets {
                        keyword,
                        domains: vec![domain],
                    }),
                }
            }
            groups
        }
        GroupingMode::CrossProduct => {
            let mut keywords: Vec<String> = Vec::new();
            let mut domains: Vec<String> = Vec::new();
            for (domain, keyword) in pairs {
                if let Some(domain) = domain {
                    if !domains.contains(&domain) {
                        domains.push(domain);
                    }
                }
                if let Some(keyword) = keyword {
                    if !keywords.contains(&keyword) {
                        keywords.push(keyword);
                    }
                }
            }
            keywords
                .into_iter()
                .map(|keyword| KeywordTargets {
                    keyword,
                    domains: domains.clone(),
                })
                .collect()
        }
    }
}

/// 表格行里的第 idx 个字段
pub(crate) fn field(row: &Row, idx: usize) -> Option<String> {
    row.get(idx).and_then(|value| value.clone())
}

/// 解析结果条目的真实地址，必要时发出二次请求
pub(crate) async fn resolve_item_url(
    adapter: &dyn EngineAdapter,
    pipeline: &mut RequestPipeline<'_>,
    item: ElementRef<'_>,
    page_url: &Url,
) -> Result<Option<String>, SpiderError> {
    match adapter.extract_item_url(item, page_url) {
        UrlExtraction::Direct(url) => Ok(Some(url)),
        UrlExtraction::FollowRedirect(url) => pipeline.resolve_redirect(&url).await.map(Some),
        UrlExtraction::FollowWrapper(url) => {
            let (final_url, document) = pipeline.fetch_raw(&url).await?;
            Ok(adapter.extract_wrapped_url(&final_url, &document))
        }
        UrlExtraction::Skip => Ok(None),
    }
}

/// 结果地址所属的主机名；地址不合法时为空串，只有通配目标能匹配
pub(crate) fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(domain: &str, keyword: &str) -> (Option<String>, Option<String>) {
        (Some(domain.to_string()), Some(keyword.to_string()))
    }

    #[test]
    fn test_group_explicit_pairs_accumulates_domains() {
        let groups = group_pairs(
            vec![
                pair("a.com", "关键词一"),
                pair("b.com", "关键词一"),
                pair("a.com", "关键词二"),
                (None, Some("没有域名".to_string())),
                (Some("c.com".to_string()), None),
            ],
            GroupingMode::ExplicitPairs,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].keyword, "关键词一");
        assert_eq!(groups[0].domains, vec!["a.com", "b.com"]);
        assert_eq!(groups[1].keyword, "关键词二");
        assert_eq!(groups[1].domains, vec!["a.com"]);
    }

    #[test]
    fn test_group_cross_product_pairs_everything() {
        let groups = group_pairs(
            vec![
                pair("a.com", "关键词一"),
                (Some("b.com".to_string()), None),
                (None, Some("关键词二".to_string())),
            ],
            GroupingMode::CrossProduct,
        );
        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert_eq!(group.domains, vec!["a.com", "b.com"]);
        }
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://a.b.com/path?q=1"), "a.b.com");
        assert_eq!(host_of("not a url"), "");
    }
}
