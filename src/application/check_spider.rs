// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 收费核对
//!
//! 读入报价表，按分组模式得到关键词到域名集合的映射，用限定一页深度
//! 的查询拿到实际排名，取每个（关键词，域名）的最好全局排名套用计费
//! 规则，输出报价与核对结果的对照表和总价。

use crate::application::{field, group_pairs, host_of, resolve_item_url, KeywordTargets, SpiderTask};
use crate::config::Settings;
use crate::domain::models::{price_for_rank, CheckRow, ErrorRecord, PriceRow, RankRecord};
use crate::domain::repositories::{Row, Workspace};
use crate::domain::search::matcher::first_matching_target;
use crate::domain::search::{EngineAdapter, SpiderError};
use crate::infrastructure::http::RequestPipeline;
use crate::utils::time::{cur_time_filename, format_cd_time};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 限定页数的排名收集器，只为核对流程服务
///
/// 单个条目的解析错误只记录不传播：一条损坏的结果不允许让整轮核对
/// 作废。关键词级的致命提取错误照常上抛。
pub struct LittleRankSpider<'a, 'b> {
    adapter: &'a dyn EngineAdapter,
    pipeline: &'b mut RequestPipeline<'a>,
}

impl<'a, 'b> LittleRankSpider<'a, 'b> {
    pub fn new(adapter: &'a dyn EngineAdapter, pipeline: &'b mut RequestPipeline<'a>) -> Self {
        Self { adapter, pipeline }
    }

    /// 抓取每个关键词的前 depth 页，返回原始匹配记录和非致命错误清单
    pub async fn collect(
        &mut self,
        groups: &[KeywordTargets],
        depth: u32,
    ) -> Result<(Vec<RankRecord>, Vec<ErrorRecord>), SpiderError> {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            self.pipeline.reset_session()?;
            info!("开始抓取第{}个关键词：{}", i + 1, group.keyword);
            let mut page_url: Option<String> = None;
            for page in 1..=depth {
                debug!("开始第{}页", page);
                let fetched = self
                    .pipeline
                    .fetch_page(&group.keyword, page, page_url.as_deref())
                    .await?;
                page_url = self.adapter.next_page_url(&fetched.document);
                let mut rank = 1u32;
                for item in fetched.items(self.adapter) {
                    let url = match resolve_item_url(
                        self.adapter,
                        self.pipeline,
                        item,
                        &fetched.final_url,
                    )
                    .await
                    {
                        Ok(Some(url)) => url,
                        Ok(None) => continue,
                        Err(err) => {
                            errors.push(ErrorRecord::new(
                                group.keyword.clone(),
                                Some(page),
                                err.to_string(),
                            ));
                            continue;
                        }
                    };
                    debug!("本页第{}条URL为{}", rank, url);
                    let host = host_of(&url);
                    if let Some(domain) =
                        first_matching_target(group.domains.iter().map(String::as_str), &host)
                    {
                        records.push(RankRecord::new(
                            domain.to_string(),
                            group.keyword.clone(),
                            page,
                            rank,
                            url,
                            self.adapter.extract_item_title(item),
                        ));
                    }
                    rank += 1;
                }
            }
        }
        Ok((records, errors))
    }
}

pub struct CheckSpider<'a> {
    adapter: &'a dyn EngineAdapter,
    pipeline: RequestPipeline<'a>,
    workspace: &'a dyn Workspace,
    settings: &'a Settings,
}

impl<'a> CheckSpider<'a> {
    pub fn new(
        adapter: &'a dyn EngineAdapter,
        workspace: &'a dyn Workspace,
        settings: &'a Settings,
    ) -> Result<Self, SpiderError> {
        let pipeline = RequestPipeline::new(adapter, workspace, &settings.crawl)?;
        Ok(Self {
            adapter,
            pipeline,
            workspace,
            settings,
        })
    }

    /// 报价目录下的第一张表
    fn read_price_rows(&self) -> Result<Vec<PriceRow>, SpiderError> {
        let dir = &self.settings.io.price_dir;
        let batch = self
            .workspace
            .input_batches(dir)?
            .into_iter()
            .next()
            .ok_or_else(|| SpiderError::Config(format!("{}目录之下没有发现表格文件", dir)))?;
        let mut source = batch.source;
        let rows = source.rows()?;
        parse_price_rows(&rows)
    }

    fn write_check_sheet(&self, check_rows: &[CheckRow], total: f64) -> Result<(), SpiderError> {
        let filename = format!(
            "核对结果-{}-{}.csv",
            self.adapter.engine_name(),
            cur_time_filename()
        );
        let mut sheet = self.workspace.create_sheet(&filename)?;
        sheet.append(&[
            Some("序号".to_string()),
            Some("关键词".to_string()),
            Some("网址".to_string()),
            Some("指数".to_string()),
            Some("前三名价格".to_string()),
            Some("四、五名价格".to_string()),
            Some("当前排名".to_string()),
            Some("今日收费".to_string()),
            Some("核对排名".to_string()),
            Some("核对收费".to_string()),
        ])?;
        for row in check_rows {
            sheet.append(&[
                Some(row.price.index.clone()),
                Some(row.price.keyword.clone()),
                Some(row.price.domain.clone()),
                row.price.exponent.clone(),
                Some(row.price.price_top3.to_string()),
                Some(row.price.price_top5.to_string()),
                row.price.quoted_rank.clone(),
                row.price.quoted_charge.clone(),
                Some(row.checked_rank.to_string()),
                Some(row.checked_charge.to_string()),
            ])?;
        }
        sheet.append(&[
            None,
            None,
            None,
            None,
            None,
            None,
            None,
            None,
            Some("核对总价".to_string()),
            Some(total.to_string()),
        ])?;
        sheet.flush()?;
        info!("核对完毕，核对结果保存在 {}", filename);
        Ok(())
    }

    fn save_error_list(&self, errors: &[ErrorRecord]) -> Result<(), SpiderError> {
        if errors.is_empty() {
            return Ok(());
        }
        let filename = format!(
            "核对过程中产生的错误-{}-{}.log",
            self.adapter.engine_name(),
            cur_time_filename()
        );
        let content = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n");
        self.workspace.write_text(&filename, &content)?;
        warn!("核对过程中产生了一些错误，虽然没有终止运行，但是可能会让结果不够准确，请将 {} 发给开发人员", filename);
        Ok(())
    }
}

impl SpiderTask for CheckSpider<'_> {
    async fn run_once(&mut self) -> Result<(), SpiderError> {
        let start_time = Instant::now();
        let prices = self.read_price_rows()?;
        let groups = group_pairs(
            prices
                .iter()
                .map(|price| (Some(price.domain.clone()), Some(price.keyword.clone()))),
            self.settings.crawl.grouping_mode,
        );

        // 核对只看第一页
        let (records, errors) = LittleRankSpider::new(self.adapter, &mut self.pipeline)
            .collect(&groups, 1)
            .await?;
        self.save_error_list(&errors)?;

        let best = best_global_ranks(&records);
        let mut total = 0.0;
        let check_rows: Vec<CheckRow> = prices
            .into_iter()
            .map(|price| {
                let checked_rank = best
                    .get(&(price.keyword.clone(), price.domain.clone()))
                    .copied()
                    .unwrap_or(0);
                let checked_charge =
                    price_for_rank(checked_rank, price.price_top3, price.price_top5);
                total += checked_charge;
                CheckRow {
                    price,
                    checked_rank,
                    checked_charge,
                }
            })
            .collect();

        self.write_check_sheet(&check_rows, total)?;
        info!(
            "本次查询用时{}",
            format_cd_time(start_time.elapsed().as_secs())
        );
        Ok(())
    }

    /// 核对结果在完成时一次写出，中途没有需要抢救的累积数据
    fn flush(&mut self) -> Result<(), SpiderError> {
        Ok(())
    }

    fn last_request(&self) -> (&str, &str) {
        (&self.pipeline.last_url, &self.pipeline.last_body)
    }
}

/// 解析报价表：跳过表头，序号为空的行跳过，价格字段必须是数字
fn parse_price_rows(rows: &[Row]) -> Result<Vec<PriceRow>, SpiderError> {
    let mut prices = Vec::new();
    for (line, row) in rows.iter().enumerate().skip(1) {
        let index = match field(row, 0) {
            Some(index) => index,
            None => continue,
        };
        let keyword = field(row, 1)
            .ok_or_else(|| SpiderError::Config(format!("报价表第{}行缺少关键词", line + 1)))?;
        let domain = field(row, 2)
            .ok_or_else(|| SpiderError::Config(format!("报价表第{}行缺少网址", line + 1)))?;
        let price_top3 = parse_price_field(row, 4, line, "前三名价格")?;
        let price_top5 = parse_price_field(row, 5, line, "四、五名价格")?;
        prices.push(PriceRow {
            index,
            keyword,
            domain,
            exponent: field(row, 3),
            price_top3,
            price_top5,
            quoted_rank: field(row, 6),
            quoted_charge: field(row, 7),
        });
    }
    Ok(prices)
}

fn parse_price_field(row: &Row, idx: usize, line: usize, name: &str) -> Result<f64, SpiderError> {
    let raw = field(row, idx)
        .ok_or_else(|| SpiderError::Config(format!("报价表第{}行缺少{}", line + 1, name)))?;
    raw.trim().parse::<f64>().map_err(|_| {
        SpiderError::Config(format!(
            "报价表第{}行的{}不是数字：{}",
            line + 1,
            name,
            raw
        ))
    })
}

/// 每个（关键词，域名）在所有匹配记录里的最好（数值最小）全局排名
fn best_global_ranks(records: &[RankRecord]) -> HashMap<(String, String), u32> {
    let mut best: HashMap<(String, String), u32> = HashMap::new();
    for record in records {
        let key = (record.keyword.clone(), record.domain.clone());
        let global = record.global_rank();
        best.entry(key)
            .and_modify(|current| {
                if global < *current {
                    *current = global;
                }
            })
            .or_insert(global);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(keyword: &str, domain: &str, page: u32, rank: u32) -> RankRecord {
        RankRecord::new(
            domain.to_string(),
            keyword.to_string(),
            page,
            rank,
            format!("https://{}/", domain),
            "标题".to_string(),
        )
    }

    #[test]
    fn test_best_global_ranks_takes_minimum() {
        let records = vec![
            record("词", "a.com", 1, 7),
            record("词", "a.com", 1, 3),
            record("词", "b.com", 2, 4),
        ];
        let best = best_global_ranks(&records);
        assert_eq!(best[&("词".to_string(), "a.com".to_string())], 3);
        assert_eq!(best[&("词".to_string(), "b.com".to_string())], 14);
    }

    #[test]
    fn test_parse_price_rows() {
        let some = |s: &str| Some(s.to_string());
        let rows: Vec<Row> = vec![
            // 表头
            vec![some("序号"), some("关键词"), some("网址")],
            vec![
                some("1"),
                some("词一"),
                some("a.com"),
                some("320"),
                some("100"),
                some("50"),
                some("2"),
                some("100"),
            ],
            // 序号为空的行跳过
            vec![
                None,
                some("词二"),
                some("b.com"),
                None,
                some("80"),
                some("40"),
                None,
                None,
            ],
        ];
        let prices = parse_price_rows(&rows).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].keyword, "词一");
        assert_eq!(prices[0].price_top3, 100.0);
        assert_eq!(prices[0].price_top5, 50.0);
    }

    #[test]
    fn test_parse_price_rows_rejects_bad_price() {
        let some = |s: &str| Some(s.to_string());
        let rows: Vec<Row> = vec![
            vec![some("序号")],
            vec![
                some("1"),
                some("词"),
                some("a.com"),
                None,
                some("一百"),
                some("50"),
                None,
                None,
            ],
        ];
        let err = parse_price_rows(&rows).unwrap_err();
        assert!(err.is_configuration());
    }
}
