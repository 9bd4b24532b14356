// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 百分号编码模块
//!
//! 按 URI 组成部分各自允许的字符类，对字符串中不允许出现的字节进行百分号编码。
//! 已经合法的 `%XX` 转义原样保留，因此对同一字符串重复编码结果不变（幂等）。

use lazy_static::lazy_static;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use regex::{Captures, Regex};

use crate::param::{PATH_CHARS, QUERY_FRAGMENT_CHARS, USER_INFO_CHARS};

/// 需要编码的 URI 组成部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    UserInfo,
    Path,
    Query,
    Fragment,
}

lazy_static! {
    static ref USER_INFO: Regex = component_pattern(USER_INFO_CHARS);
    static ref PATH: Regex = component_pattern(PATH_CHARS);
    static ref QUERY_FRAGMENT: Regex = component_pattern(QUERY_FRAGMENT_CHARS);
}

// 依次匹配：合法转义、不允许字符组成的最长片段、孤立的 `%`
fn component_pattern(allowed: &str) -> Regex {
    let pattern = format!(r"%[0-9A-Fa-f]{{2}}|[^{}%]+|%", allowed);
    Regex::new(&pattern).unwrap()
}

impl Component {
    fn pattern(&self) -> &'static Regex {
        match *self {
            Component::UserInfo => &*USER_INFO,
            Component::Path => &*PATH,
            Component::Query | Component::Fragment => &*QUERY_FRAGMENT,
        }
    }
}

/// 对 `input` 做百分号编码，只保留 `component` 允许的字符与合法的 `%XX` 转义。
pub fn encode(input: &str, component: Component) -> String {
    component
        .pattern()
        .replace_all(input, |caps: &Captures| {
            let matched = &caps[0];
            if matched.len() == 3 && matched.starts_with('%') {
                matched.to_string()
            } else {
                percent_encode(matched.as_bytes(), NON_ALPHANUMERIC).to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_space_and_unicode() {
        assert_eq!(encode("a b", Component::Path), "a%20b");
        assert_eq!(encode("/путь", Component::Path), "/%D0%BF%D1%83%D1%82%D1%8C");
        assert_eq!(encode("q=a b&c", Component::Query), "q=a%20b&c");
    }

    #[test]
    fn test_valid_escape_untouched() {
        assert_eq!(encode("/a%2fb", Component::Path), "/a%2fb");
        assert_eq!(encode("x=%41", Component::Query), "x=%41");
        assert_eq!(encode("us%65r", Component::UserInfo), "us%65r");
    }

    #[test]
    fn test_lone_percent_encoded() {
        assert_eq!(encode("100%", Component::Path), "100%25");
        assert_eq!(encode("%zz", Component::Query), "%25zz");
        assert_eq!(encode("%4", Component::Fragment), "%254");
    }

    #[test]
    fn test_component_character_classes() {
        // `:` 和 `@` 在用户信息中需要编码，在路径中保留
        assert_eq!(encode("a:b@c", Component::UserInfo), "a%3Ab%40c");
        assert_eq!(encode("a:b@c", Component::Path), "a:b@c");
        // `?` 在路径中需要编码，在查询串中保留
        assert_eq!(encode("a?b", Component::Path), "a%3Fb");
        assert_eq!(encode("a?b", Component::Query), "a?b");
        assert_eq!(encode("#frag", Component::Fragment), "%23frag");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(encode("", Component::Path), "");
    }

    proptest! {
        #[test]
        fn prop_encode_is_idempotent(input in "\\PC*") {
            for component in [Component::UserInfo, Component::Path, Component::Query, Component::Fragment] {
                let once = encode(&input, component);
                let twice = encode(&once, component);
                prop_assert_eq!(once, twice);
            }
        }
    }
}
