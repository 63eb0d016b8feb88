// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Local;

/// 用于输出文件命名的当前时间字符串
pub fn cur_time_filename() -> String {
    Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// 把秒数格式化成 "X小时YY分ZZ秒"
pub fn format_cd_time(seconds: u64) -> String {
    let (m, s) = (seconds / 60, seconds % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{}小时{:02}分{:02}秒", h, m, s)
}
