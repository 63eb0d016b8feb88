// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod baidu_mobile;
pub mod baidu_pc;
pub mod shenma;
pub mod so_mobile;
pub mod so_pc;
pub mod sogou_mobile;
pub mod sogou_pc;

use crate::config::Settings;
use crate::domain::search::EngineAdapter;
use scraper::{ElementRef, Html};

/// 搜索引擎类型，启动时从静态注册表选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// 神马（UC 移动搜索）
    Shenma,
    /// 搜狗 PC 端
    SogouPc,
    /// 搜狗移动端
    SogouMobile,
    /// 百度 PC 端
    BaiduPc,
    /// 百度移动端
    BaiduMobile,
    /// 360 PC 端
    SoPc,
    /// 360 移动端
    SoMobile,
}

impl EngineKind {
    pub const ALL: [EngineKind; 7] = [
        Self::Shenma,
        Self::SogouPc,
        Self::SogouMobile,
        Self::BaiduPc,
        Self::BaiduMobile,
        Self::SoPc,
        Self::SoMobile,
    ];

    /// 配置和命令行里使用的引擎 id
    pub fn id(&self) -> &'static str {
        match self {
            Self::Shenma => "shenma",
            Self::SogouPc => "sogou-pc",
            Self::SogouMobile => "sogou-mobile",
            Self::BaiduPc => "baidu-pc",
            Self::BaiduMobile => "baidu-mobile",
            Self::SoPc => "so-pc",
            Self::SoMobile => "so-mobile",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.id() == id)
    }

    /// 按配置里的请求间隔构造适配器实例
    pub fn build(&self, settings: &Settings) -> Box<dyn EngineAdapter> {
        let interval = settings.request_interval(self.id());
        match self {
            Self::Shenma => Box::new(shenma::ShenmaEngine::new(interval)),
            Self::SogouPc => Box::new(sogou_pc::SogouPcEngine::new(interval)),
            Self::SogouMobile => Box::new(sogou_mobile::SogouMobileEngine::new(interval)),
            Self::BaiduPc => Box::new(baidu_pc::BaiduPcEngine::new(interval)),
            Self::BaiduMobile => Box::new(baidu_mobile::BaiduMobileEngine::new(interval)),
            Self::SoPc => Box::new(so_pc::SoPcEngine::new(interval)),
            Self::SoMobile => Box::new(so_mobile::SoMobileEngine::new(interval)),
        }
    }
}

pub(crate) const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3770.100 Safari/537.36";
pub(crate) const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 5.0; SM-G900P Build/LRX21T) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3770.100 Mobile Safari/537.36";

/// 页面任意文本节点里是否出现该文案
pub(crate) fn page_has_text(document: &Html, needle: &str) -> bool {
    document
        .root_element()
        .text()
        .any(|text| text.contains(needle))
}

/// 元素的可见文本：文本节点拼接，注释节点天然不在其中
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}
