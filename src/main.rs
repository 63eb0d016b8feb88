// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::anyhow;
use clap::{Parser, ValueEnum};
use rankspider::application::scheduler::{self, RunMode};
use rankspider::application::{CheckSpider, RankSpider, SiteSpider, SpiderTask};
use rankspider::config::Settings;
use rankspider::domain::repositories::Workspace;
use rankspider::infrastructure::repositories::CsvWorkspace;
use rankspider::infrastructure::search::EngineKind;
use rankspider::utils::telemetry;
use rankspider::utils::time::cur_time_filename;
use tracing::{error, info};

/// 搜索引擎关键词排名查询工具
#[derive(Parser)]
#[command(name = "rankspider", version)]
struct Cli {
    /// 搜索引擎：shenma、sogou-pc、sogou-mobile、baidu-pc、baidu-mobile、so-pc、so-mobile
    #[arg(long)]
    engine: String,

    /// 查询任务
    #[arg(long, value_enum, default_value_t = Task::Rank)]
    task: Task,

    /// 马上运行还是每天定时运行
    #[arg(long, value_enum, default_value_t = Mode::Now)]
    mode: Mode,

    /// 配置文件路径（不带扩展名）
    #[arg(long, default_value = "config/default")]
    config: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Task {
    /// 关键词排名查询
    Rank,
    /// site: 收录查询
    Site,
    /// 报价核对
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Now,
    Daily,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();
    let cli = Cli::parse();

    let settings = Settings::with_file(&cli.config)?;
    let kind = EngineKind::from_id(&cli.engine)
        .ok_or_else(|| anyhow!("未知的搜索引擎：{}", cli.engine))?;
    let adapter = kind.build(&settings);
    let workspace = CsvWorkspace::new(&settings.io.output_dir);
    let mode = match cli.mode {
        Mode::Now => RunMode::Immediate,
        Mode::Daily => RunMode::Daily,
    };
    info!("rankspider 启动，引擎：{}", adapter.engine_name());

    match cli.task {
        Task::Rank => {
            let task = RankSpider::new(adapter.as_ref(), &workspace, &settings)?;
            drive(task, &workspace, mode, settings.schedule.hour).await
        }
        Task::Site => {
            let task = SiteSpider::new(adapter.as_ref(), &workspace, &settings)?;
            drive(task, &workspace, mode, settings.schedule.hour).await
        }
        Task::Check => {
            let task = CheckSpider::new(adapter.as_ref(), &workspace, &settings)?;
            drive(task, &workspace, mode, settings.schedule.hour).await
        }
    }
}

/// 驱动任务直到完成、出错或收到中断
///
/// 中断视为优雅退出：先把当前批次已积累的记录落盘再退出进程。
/// 非配置类的致命错误同样先落盘，然后写出带最后一次请求地址和响应
/// 内容的诊断日志。
async fn drive<T: SpiderTask>(
    mut task: T,
    workspace: &CsvWorkspace,
    mode: RunMode,
    hour: u32,
) -> anyhow::Result<()> {
    let outcome = {
        let run = scheduler::run(&mut task, mode, hour);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };
    match outcome {
        None => {
            task.flush()?;
            info!("已经强行退出程序");
            Ok(())
        }
        Some(Ok(())) => Ok(()),
        Some(Err(err)) if err.is_configuration() => Err(err.into()),
        Some(Err(err)) => {
            task.flush()?;
            let (url, body) = task.last_request();
            let filename = format!("error-{}.log", cur_time_filename());
            workspace.write_text(
                &filename,
                &format!(
                    "{}\n\n请求的URL为：\n{}\n\n返回的内容为：\n{}\n",
                    err, url, body
                ),
            )?;
            error!("请将最新的 {} 文件发给技术人员", filename);
            Err(err.into())
        }
    }
}
