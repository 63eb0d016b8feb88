// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 运行调度：马上执行一次，或每天固定整点执行
//!
//! 每日模式是显式循环加等待，长期运行不积累调用栈。

use crate::application::SpiderTask;
use crate::domain::search::SpiderError;
use crate::utils::time::format_cd_time;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::time::sleep;
use tracing::info;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 运行一次后返回
    Immediate,
    /// 每天在配置的整点运行，无限循环
    Daily,
}

/// 下一次运行时刻：今天的该整点，已经过了就顺延到明天
pub fn next_daily_run(now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let at = NaiveDateTime::new(now.date(), time);
    if at <= now {
        at + TimeDelta::days(1)
    } else {
        at
    }
}

/// 按运行模式驱动一个爬虫任务
pub async fn run<T: SpiderTask>(
    task: &mut T,
    mode: RunMode,
    hour: u32,
) -> Result<(), SpiderError> {
    match mode {
        RunMode::Immediate => task.run_once().await,
        RunMode::Daily => loop {
            let now = Local::now().naive_local();
            let next = next_daily_run(now, hour);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(
                "下次查询时间为{}，将在{}后开始",
                next,
                format_cd_time(wait.as_secs())
            );
            sleep(wait).await;
            task.run_once().await?;
        },
    }
}
