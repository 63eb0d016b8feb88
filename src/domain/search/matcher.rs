// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 目标域名与结果主机名的归属判断
//!
//! 目标是点分标签序列或通配符 `*`。匹配按标签而不是按字符：目标的标签
//! 序列必须在主机名标签序列中连续出现，且锚定在目标首标签第一次出现的
//! 位置，所以 `b.com` 匹配 `a.b.com`，而 `b.co` 不匹配。

/// 匹配任意主机名的通配目标
pub const WILDCARD: &str = "*";

/// 目标域名是否匹配主机名
pub fn target_matches_host(target: &str, host: &str) -> bool {
    if target == WILDCARD {
        return true;
    }
    let target_labels: Vec<&str> = target.split('.').collect();
    let host_labels: Vec<&str> = host.split('.').collect();
    let first = match target_labels.first() {
        Some(first) => *first,
        None => return false,
    };
    // 只在首标签第一次出现的位置比对
    match host_labels.iter().position(|label| *label == first) {
        Some(start) => host_labels[start..]
            .iter()
            .take(target_labels.len())
            .eq(target_labels.iter()),
        None => false,
    }
}

/// 按配置顺序找出第一个匹配的目标域名
///
/// 一个条目最多归属一个目标：命中即停，剩余目标不再比对。
pub fn first_matching_target<'a>(
    targets: impl IntoIterator<Item = &'a str>,
    host: &str,
) -> Option<&'a str> {
    targets
        .into_iter()
        .find(|target| target_matches_host(target, host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matches_itself() {
        assert!(target_matches_host("www.example.com", "www.example.com"));
        assert!(target_matches_host("example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        assert!(target_matches_host("*", "a.b.com"));
        assert!(target_matches_host("*", ""));
    }

    #[test]
    fn test_suffix_labels_match() {
        assert!(target_matches_host("b.com", "a.b.com"));
        assert!(target_matches_host("example.com", "www.sub.example.com"));
    }

    #[test]
    fn test_character_substring_does_not_match() {
        // 标签必须整体相等，不是字符串包含
        assert!(!target_matches_host("b.co", "a.b.com"));
        assert!(!target_matches_host("xample.com", "example.com"));
    }

    #[test]
    fn test_anchored_at_first_occurrence() {
        // 锚定在首标签第一次出现处，之后必须连续
        assert!(target_matches_host("b.b.com", "a.b.b.com"));
        assert!(!target_matches_host("b.com", "com.b"));
    }

    #[test]
    fn test_target_longer_than_host_tail() {
        assert!(!target_matches_host("a.b.c.com", "b.c.com"));
        assert!(!target_matches_host("example.com.cn", "example.com"));
    }

    #[test]
    fn test_first_matching_target_wins() {
        let targets = ["other.com", "b.com", "*"];
        assert_eq!(
            first_matching_target(targets.iter().copied(), "a.b.com"),
            Some("b.com")
        );
        assert_eq!(
            first_matching_target(targets.iter().copied(), "nothing.cn"),
            Some("*")
        );
        assert_eq!(
            first_matching_target(["x.com"].iter().copied(), "y.com"),
            None
        );
    }
}
