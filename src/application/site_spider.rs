// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 收录查询
//!
//! 对每个配置的域名反复发出 `site:域名` 查询，逐页收集条目标题直到
//! 没有下一页。查询本身已把结果限定在该域名，不需要再做归属判断。

use crate::application::{field, SpiderTask};
use crate::config::Settings;
use crate::domain::repositories::Workspace;
use crate::domain::search::{EngineAdapter, SpiderError};
use crate::infrastructure::http::RequestPipeline;
use crate::utils::time::{cur_time_filename, format_cd_time};
use std::time::Instant;
use tracing::{debug, info};

pub struct SiteSpider<'a> {
    adapter: &'a dyn EngineAdapter,
    pipeline: RequestPipeline<'a>,
    workspace: &'a dyn Workspace,
    settings: &'a Settings,
    started: bool,
    domain_titles: Vec<(String, Vec<String>)>,
}

impl<'a> SiteSpider<'a> {
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
            domain_titles: Vec::new(),
        })
    }

    /// 所有输入表格里的域名，保序去重
    fn read_domains(&self) -> Result<Vec<String>, SpiderError> {
        let batches = self
            .workspace
            .input_batches(&self.settings.io.site_dir)?;
        let mut domains = Vec::new();
        for batch in batches {
            let mut source = batch.source;
            for row in source.rows()?.iter().skip(1) {
                if let Some(domain) = field(row, 0) {
                    if !domains.contains(&domain) {
                        domains.push(domain);
                    }
                }
            }
        }
        Ok(domains)
    }

    async fn crawl_domain(&mut self, domain: &str) -> Result<(), SpiderError> {
        info!("开始查找的域名为 {}", domain);
        let query = format!("site:{}", domain);
        self.domain_titles.push((domain.to_string(), Vec::new()));
        let mut page = 1u32;
        let mut page_url: Option<String> = None;
        loop {
            debug!("开始第{}页", page);
            let fetched = self
                .pipeline
                .fetch_page(&query, page, page_url.as_deref())
                .await?;
            if let Some((_, titles)) = self.domain_titles.last_mut() {
                for item in fetched.items(self.adapter) {
                    titles.push(self.adapter.extract_item_title(item));
                }
            }
            if !self.adapter.has_next_page(&fetched.document) {
                break;
            }
            page_url = self.adapter.next_page_url(&fetched.document);
            page += 1;
        }
        Ok(())
    }
}

impl SpiderTask for SiteSpider<'_> {
    async fn run_once(&mut self) -> Result<(), SpiderError> {
        let domains = self.read_domains()?;
        self.domain_titles.clear();
        self.started = true;
        let start_time = Instant::now();
        for domain in domains {
            self.crawl_domain(&domain).await?;
        }
        self.flush()?;
        info!(
            "本次查询用时{}",
            format_cd_time(start_time.elapsed().as_secs())
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpiderError> {
        if !self.started {
            return Ok(());
        }
        let timestamp = cur_time_filename();
        for (domain, titles) in &self.domain_titles {
            let filename = format!(
                "收录标题-{}-{}-{}.csv",
                self.adapter.engine_name(),
                domain,
                timestamp
            );
            let mut sheet = self.workspace.create_sheet(&filename)?;
            for title in titles {
                sheet.append(&[Some(title.clone())])?;
            }
            sheet.flush()?;
            info!("收录标题保存在 {}", filename);
        }
        self.domain_titles.clear();
        self.started = false;
        Ok(())
    }

    fn last_request(&self) -> (&str, &str) {
        (&self.pipeline.last_url, &self.pipeline.last_body)
    }
}
