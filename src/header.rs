// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 标头存储模块
//!
//! `Headers` 按插入顺序保存标头，名称查找大小写不敏感，同时记住调用方最初使用的大小写。
//! 每个标头的值都是一个有序的字符串序列，用于支持重复出现的标头。

use lazy_static::lazy_static;
use regex::Regex;

use crate::exception::Exception;

lazy_static! {
    /// RFC 7230 中 token 的定义
    static ref TOKEN: Regex = Regex::new(r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    /// 调用方使用的原始大小写
    name: String,
    values: Vec<String>,
}

/// 大小写不敏感、保持顺序、支持多值的标头集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `(名称, 值列表)` 序列构造。名称仅大小写不同的条目会被合并。
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self, Exception>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let mut headers = Self::new();
        for (name, values) in pairs {
            headers.append(name.as_ref(), values)?;
        }
        Ok(headers)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// 标头的所有值；不存在时返回空切片
    pub fn get(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.entries[i].values,
            None => &[],
        }
    }

    /// 以 `, ` 连接的标头值；不存在时返回空串
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    /// 标头被记住的原始名称
    pub fn original_name(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].name.as_str())
    }

    /// 以原始名称遍历所有标头
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    /// 替换标头的全部值，名称大小写以本次调用为准；位置保持不变。
    pub fn set<V>(&mut self, name: &str, values: V) -> Result<(), Exception>
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        validate_name(name)?;
        let values = normalize_values(values)?;
        match self.position(name) {
            Some(i) => {
                self.entries[i] = HeaderEntry {
                    name: name.to_string(),
                    values,
                }
            }
            None => self.entries.push(HeaderEntry {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// 在已有值之后追加；标头不存在时新建。
    pub fn append<V>(&mut self, name: &str, values: V) -> Result<(), Exception>
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        validate_name(name)?;
        let values = normalize_values(values)?;
        match self.position(name) {
            Some(i) => self.entries[i].values.extend(values),
            None => self.entries.push(HeaderEntry {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// 移除标头，返回是否确实移除了内容
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// 替换标头并把它移动到最前面；用于由 URI 合成 `Host`。
    pub(crate) fn set_first(&mut self, name: &str, value: String) {
        self.remove(name);
        self.entries.insert(
            0,
            HeaderEntry {
                name: name.to_string(),
                values: vec![value],
            },
        );
    }
}

fn validate_name(name: &str) -> Result<(), Exception> {
    if !TOKEN.is_match(name) {
        return Err(Exception::InvalidHeaderName(name.to_string()));
    }
    Ok(())
}

fn normalize_values<V>(values: V) -> Result<Vec<String>, Exception>
where
    V: IntoIterator,
    V::Item: Into<String>,
{
    values
        .into_iter()
        .map(|value| {
            let value: String = value.into();
            if value.contains(['\r', '\n', '\0']) {
                return Err(Exception::InvalidHeaderValue(value));
            }
            Ok(value.trim_matches([' ', '\t']).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.set("Content-Type", ["text/html"]).unwrap();

        assert!(headers.contains("content-type"));
        assert!(headers.contains("CONTENT-TYPE"));
        assert_eq!(headers.get("content-type"), ["text/html".to_string()]);
        assert_eq!(headers.original_name("content-TYPE"), Some("Content-Type"));
    }

    #[test]
    fn test_multi_value_line() {
        let mut headers = Headers::new();
        headers.append("Accept", ["text/html"]).unwrap();
        headers.append("accept", ["application/json"]).unwrap();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.line("ACCEPT"), "text/html, application/json");
        assert_eq!(headers.original_name("accept"), Some("Accept"));
    }

    #[test]
    fn test_set_replaces_and_keeps_position() {
        let mut headers =
            Headers::from_pairs([("A", vec!["1"]), ("B", vec!["2"]), ("C", vec!["3"])]).unwrap();
        headers.set("b", ["20", "21"]).unwrap();

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["A", "b", "C"]);
        assert_eq!(headers.line("B"), "20, 21");
    }

    #[test]
    fn test_missing_header() {
        let headers = Headers::new();
        assert!(headers.get("x-missing").is_empty());
        assert_eq!(headers.line("x-missing"), "");
        assert_eq!(headers.original_name("x-missing"), None);
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::from_pairs([("X-Token", ["abc"])]).unwrap();
        assert!(headers.remove("x-token"));
        assert!(!headers.remove("x-token"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_set_first() {
        let mut headers = Headers::from_pairs([("Accept", ["*/*"]), ("host", ["old"])]).unwrap();
        headers.set_first("Host", "new.example.com".to_string());

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["Host", "Accept"]);
        assert_eq!(headers.line("host"), "new.example.com");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut headers = Headers::new();
        assert!(matches!(
            headers.set("Bad Name", ["x"]),
            Err(Exception::InvalidHeaderName(_))
        ));
        assert!(headers.set("", ["x"]).is_err());
        assert!(headers.append("X:Y", ["x"]).is_err());
    }

    #[test]
    fn test_header_injection_rejected() {
        let mut headers = Headers::new();
        let err = headers
            .set("X-Test", ["value\r\nInjected: yes"])
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(headers.append("X-Test", ["nul\0"]).is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_values_trimmed() {
        let headers = Headers::from_pairs([("X-Pad", ["  padded\t"])]).unwrap();
        assert_eq!(headers.line("x-pad"), "padded");
    }
}
