// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 批量关键词排名查询
//!
//! 按输入文件分批：文件内的每个关键词逐页抓取，条目归属到目标域名后
//! 累积成排名记录，批次结束统一落盘。单个关键词的致命提取失败只记入
//! 未查找清单，不中断整个批次。

use crate::application::{
    field, group_pairs, host_of, resolve_item_url, KeywordTargets, SpiderTask,
};
use crate::config::Settings;
use crate::domain::models::{ErrorRecord, RankRecord, UnsafeItemRecord};
use crate::domain::repositories::{NamedSource, Workspace};
use crate::domain::search::matcher::first_matching_target;
use crate::domain::search::{EngineAdapter, SpiderError};
use crate::infrastructure::http::{FetchedPage, RequestPipeline};
use crate::utils::time::{cur_time_filename, format_cd_time};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct RankSpider<'a> {
    adapter: &'a dyn EngineAdapter,
    pipeline: RequestPipeline<'a>,
    workspace: &'a dyn Workspace,
    settings: &'a Settings,
    /// 当前批次是否有未落盘的数据
    started: bool,
    batch_name: String,
    batch_keywords: Vec<String>,
    result: Vec<RankRecord>,
    searched: Vec<String>,
    errors: Vec<ErrorRecord>,
    unsafe_items: Vec<UnsafeItemRecord>,
    start_time: Instant,
}

impl<'a> RankSpider<'a> {
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
            started: false,
            batch_name: String::new(),
            batch_keywords: Vec::new(),
            result: Vec::new(),
            searched: Vec::new(),
            errors: Vec::new(),
            unsafe_items: Vec::new(),
            start_time: Instant::now(),
        })
    }

    async fn run_batch(&mut self, index: usize, batch: NamedSource) -> Result<(), SpiderError> {
        info!("开始第{}个文件 {}", index, batch.name);
        let mut source = batch.source;
        let rows = source.rows()?;
        // 首行是表头
        let groups = group_pairs(
            rows.iter()
                .skip(1)
                .map(|row| (field(row, 0), field(row, 1))),
            self.settings.crawl.grouping_mode,
        );

        self.batch_name = batch.name;
        self.batch_keywords = groups.iter().map(|group| group.keyword.clone()).collect();
        self.result.clear();
        self.searched.clear();
        self.errors.clear();
        self.unsafe_items.clear();
        self.start_time = Instant::now();
        self.started = true;

        info!("总共要查找{}个关键词", groups.len());
        for (i, group) in groups.iter().enumerate() {
            info!(
                "开始抓取第{}/{}个关键词：{}",
                i + 1,
                groups.len(),
                group.keyword
            );
            match self.crawl_keyword(group).await {
                Ok(()) => self.searched.push(group.keyword.clone()),
                Err(err @ SpiderError::ExtractionExhausted { .. }) => {
                    // 该关键词记为未查找，继续后面的关键词
                    warn!("{err}");
                    self.errors
                        .push(ErrorRecord::new(group.keyword.clone(), None, err.to_string()));
                }
                Err(other) => return Err(other),
            }
        }
        self.flush()?;
        info!(
            "本次查询用时{}",
            format_cd_time(self.start_time.elapsed().as_secs())
        );
        Ok(())
    }

    async fn crawl_keyword(&mut self, group: &KeywordTargets) -> Result<(), SpiderError> {
        self.pipeline.reset_session()?;
        let mut page_url: Option<String> = None;
        for page in 1..=self.settings.crawl.page_depth {
            debug!("开始第{}页", page);
            let fetched = self
                .pipeline
                .fetch_page(&group.keyword, page, page_url.as_deref())
                .await?;
            debug!("本页实际请求URL为{}", fetched.final_url);
            if page == 1 {
                self.unsafe_items.push(UnsafeItemRecord::blank_check(
                    group.keyword.clone(),
                    fetched.no_results,
                ));
            }
            self.collect_page(&fetched, page, group).await?;
            if !self.adapter.has_next_page(&fetched.document) {
                break;
            }
            page_url = self.adapter.next_page_url(&fetched.document);
        }
        Ok(())
    }

    /// 逐条解析地址、归属目标域名；排名只对取得地址的条目递增
    async fn collect_page(
        &mut self,
        fetched: &FetchedPage,
        page: u32,
        group: &KeywordTargets,
    ) -> Result<(), SpiderError> {
        let items = fetched.items(self.adapter);
        let mut rank = 1u32;
        for item in items {
            let url = match resolve_item_url(
                self.adapter,
                &mut self.pipeline,
                item,
                &fetched.final_url,
            )
            .await
            {
                Ok(Some(url)) => url,
                Ok(None) => continue,
                Err(err) => {
                    // 单条目错误只记录，不中断本页
                    self.errors.push(ErrorRecord::new(
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
                self.result.push(RankRecord::new(
                    domain.to_string(),
                    group.keyword.clone(),
                    page,
                    rank,
                    url.clone(),
                    self.adapter.extract_item_title(item),
                ));
            }
            if self.adapter.is_unsafe_listing(item) {
                self.unsafe_items.push(UnsafeItemRecord::unsafe_listing(
                    group.keyword.clone(),
                    url,
                    page,
                    rank,
                ));
            }
            rank += 1;
        }
        Ok(())
    }

    fn save_result_sheet(&mut self, timestamp: &str) -> Result<(), SpiderError> {
        let filename = format!(
            "关键词排名-{}-{}-{}.csv",
            self.adapter.engine_name(),
            self.batch_name,
            timestamp
        );
        let mut sheet = self.workspace.create_sheet(&filename)?;
        sheet.append(&[
            Some("域名".to_string()),
            Some("关键词".to_string()),
            Some("搜索引擎".to_string()),
            Some("页数".to_string()),
            Some("排名".to_string()),
            Some("真实地址".to_string()),
            Some("标题".to_string()),
            Some("查询时间".to_string()),
        ])?;
        for record in &self.result {
            sheet.append(&[
                Some(record.domain.clone()),
                Some(record.keyword.clone()),
                Some(self.adapter.engine_name().to_string()),
                Some(record.page.to_string()),
                Some(record.rank.to_string()),
                Some(record.url.clone()),
                Some(record.title.clone()),
                Some(record.checked_at.format("%Y/%m/%d").to_string()),
            ])?;
        }
        sheet.flush()?;
        self.result.clear();
        info!("查询结束，查询结果保存在 {}", filename);
        Ok(())
    }

    fn save_unsearched(&self, timestamp: &str) -> Result<(), SpiderError> {
        let unsearched: Vec<&String> = self
            .batch_keywords
            .iter()
            .filter(|keyword| !self.searched.contains(keyword))
            .collect();
        if unsearched.is_empty() {
            return Ok(());
        }
        let filename = format!("未查找关键词-{}.csv", timestamp);
        let mut sheet = self.workspace.create_sheet(&filename)?;
        for keyword in unsearched {
            sheet.append(&[Some(keyword.clone())])?;
        }
        sheet.flush()?;
        info!("未查询结果保存在 {}", filename);
        Ok(())
    }

    fn save_error_list(&self, timestamp: &str) -> Result<(), SpiderError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let filename = format!(
            "排名查询过程中产生的错误-{}-{}.log",
            self.adapter.engine_name(),
            timestamp
        );
        let content = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n");
        self.workspace.write_text(&filename, &content)?;
        warn!("排名查询过程中产生了一些错误，虽然没有终止运行，但是可能会让结果不够准确，请将 {} 发给开发人员", filename);
        Ok(())
    }

    fn save_unsafe_items(&self, timestamp: &str) -> Result<(), SpiderError> {
        if self.unsafe_items.is_empty() {
            return Ok(());
        }
        let filename = format!(
            "关键词是否空白以及安全提醒网站-{}-{}.csv",
            self.adapter.engine_name(),
            timestamp
        );
        let mut sheet = self.workspace.create_sheet(&filename)?;
        sheet.append(&[
            Some("关键词".to_string()),
            Some("是否空白".to_string()),
            Some("安全提醒".to_string()),
            Some("页数".to_string()),
            Some("排名".to_string()),
        ])?;
        for record in &self.unsafe_items {
            sheet.append(&[
                Some(record.keyword.clone()),
                record
                    .no_result
                    .map(|blank| (if blank { "是" } else { "否" }).to_string()),
                record.url.clone(),
                record.page.map(|page| page.to_string()),
                record.rank.map(|rank| rank.to_string()),
            ])?;
        }
        sheet.flush()?;
        Ok(())
    }
}

impl SpiderTask for RankSpider<'_> {
    async fn run_once(&mut self) -> Result<(), SpiderError> {
        let batches = self
            .workspace
            .input_batches(&self.settings.io.input_dir)?;
        if batches.is_empty() {
            warn!("{}目录之下没有发现表格文件", self.settings.io.input_dir);
        }
        for (index, batch) in batches.into_iter().enumerate() {
            self.run_batch(index + 1, batch).await?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpiderError> {
        if !self.started {
            return Ok(());
        }
        let timestamp = cur_time_filename();
        self.save_result_sheet(&timestamp)?;
        self.save_unsearched(&timestamp)?;
        self.save_error_list(&timestamp)?;
        self.save_unsafe_items(&timestamp)?;
        self.started = false;
        Ok(())
    }

    fn last_request(&self) -> (&str, &str) {
        (&self.pipeline.last_url, &self.pipeline.last_body)
    }
}
