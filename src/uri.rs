// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # URI 值对象模块
//!
//! `Uri` 是一个不可变的值对象，保存 URI 的七个组成部分：
//! scheme、user-info、host、port、path、query、fragment。
//!
//! 1. 每个组成部分在构造和每次 `with_*` 时都会被校验并规范化，存储的永远是规范形式。
//! 2. 所有 `with_*` 都返回新实例；如果规范化后的值没有变化，则返回共享同一份数据的原实例
//!    （可用 [`Uri::ptr_eq`] 观察）。
//! 3. 字符串形式在第一次访问时生成并缓存，新实例拥有独立的空缓存。

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    encoder::{encode, Component},
    exception::Exception,
    param::{is_standard_port, SCHEMES},
};

lazy_static! {
    /// RFC 3986 附录 B 给出的通用拆分表达式
    static ref URI_PARTS: Regex =
        Regex::new(r"^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$").unwrap();
    static ref SCHEME_SUFFIX: Regex = Regex::new(r":(//)?$").unwrap();
}

#[derive(Debug, Default)]
struct UriParts {
    scheme: String,
    user_info: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
    /// 渲染后的字符串缓存
    rendered: OnceLock<String>,
}

impl UriParts {
    /// 复制所有组成部分，但不复制渲染缓存
    fn fork(&self) -> Self {
        Self {
            scheme: self.scheme.clone(),
            user_info: self.user_info.clone(),
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            query: self.query.clone(),
            fragment: self.fragment.clone(),
            rendered: OnceLock::new(),
        }
    }
}

/// 不可变的 URI 值对象。克隆只增加引用计数。
#[derive(Clone, Default)]
pub struct Uri {
    inner: Arc<UriParts>,
}

impl Uri {
    /// 构造一个所有组成部分都为空的 URI
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 URI 字符串解析并规范化各个组成部分。
    ///
    /// 空字符串得到空 URI。协议不受支持、端口非法时返回 `InvalidInput` 类异常。
    pub fn parse(uri: &str) -> Result<Self, Exception> {
        if uri.is_empty() {
            return Ok(Self::new());
        }

        let caps = URI_PARTS
            .captures(uri)
            .ok_or_else(|| Exception::MalformedUri(uri.to_string()))?;
        let group = |i: usize| caps.get(i).map(|m| m.as_str());

        let mut parts = UriParts::default();
        if let Some(scheme) = group(1) {
            parts.scheme = normalize_scheme(scheme)?;
        }
        if let Some(authority) = group(2) {
            let (user_info, host_port) = match authority.rfind('@') {
                Some(at) => (Some(&authority[..at]), &authority[at + 1..]),
                None => (None, authority),
            };
            if let Some(user_info) = user_info {
                let (user, password) = match user_info.split_once(':') {
                    Some((user, password)) => (user, Some(password)),
                    None => (user_info, None),
                };
                parts.user_info = normalize_user_info(user, password);
            }
            let (host, port) = split_host_port(host_port)
                .ok_or_else(|| Exception::MalformedUri(uri.to_string()))?;
            parts.host = normalize_host(host);
            if let Some(port) = port.filter(|p| !p.is_empty()) {
                parts.port = Some(parse_port(port)?);
            }
        }
        parts.path = normalize_path(group(3).unwrap_or(""));
        // 分隔符已被正则去掉，这里不能再剥离开头的 `?` 或 `#`
        parts.query = encode(group(4).unwrap_or(""), Component::Query);
        parts.fragment = encode(group(5).unwrap_or(""), Component::Fragment);

        Ok(Self {
            inner: Arc::new(parts),
        })
    }

    /// 判断两个 `Uri` 是否共享同一份数据（即 `with_*` 短路返回了原实例）
    pub fn ptr_eq(a: &Uri, b: &Uri) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn derive(&self, update: impl FnOnce(&mut UriParts)) -> Self {
        let mut parts = self.inner.fork();
        update(&mut parts);
        Self {
            inner: Arc::new(parts),
        }
    }
}

// --- Getter 访问器实现 ---

impl Uri {
    pub fn scheme(&self) -> &str {
        &self.inner.scheme
    }

    pub fn user_info(&self) -> &str {
        &self.inner.user_info
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// 显式设置的端口；标准端口同样会被保存，只是不会出现在 authority 中
    pub fn port(&self) -> Option<u16> {
        self.inner.port
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn query(&self) -> &str {
        &self.inner.query
    }

    pub fn fragment(&self) -> &str {
        &self.inner.fragment
    }

    /// `[user-info@]host[:port]`，host 为空时返回空串；端口是当前协议的标准端口时省略。
    pub fn authority(&self) -> String {
        let parts = &self.inner;
        if parts.host.is_empty() {
            return String::new();
        }

        let mut authority = String::new();
        if !parts.user_info.is_empty() {
            authority.push_str(&parts.user_info);
            authority.push('@');
        }
        authority.push_str(&parts.host);
        if let Some(port) = parts.port {
            if !is_standard_port(&parts.scheme, port) {
                authority.push(':');
                authority.push_str(&port.to_string());
            }
        }
        authority
    }

    /// 规范化后的完整字符串形式（带缓存）
    pub fn as_str(&self) -> &str {
        self.inner.rendered.get_or_init(|| self.render())
    }

    fn render(&self) -> String {
        let parts = &self.inner;
        let mut out = String::new();

        if !parts.scheme.is_empty() {
            out.push_str(&parts.scheme);
            out.push(':');
        }

        let authority = self.authority();
        if !authority.is_empty() {
            out.push_str("//");
            out.push_str(&authority);
        }

        if !parts.path.is_empty() {
            if !authority.is_empty() {
                // 有 authority 时路径必须以 `/` 开头，只作用于渲染结果
                out.push('/');
                out.push_str(parts.path.trim_start_matches('/'));
            } else {
                out.push_str(&parts.path);
            }
        }

        if !parts.query.is_empty() {
            out.push('?');
            out.push_str(&parts.query);
        }

        if !parts.fragment.is_empty() {
            out.push('#');
            out.push_str(&parts.fragment);
        }

        out
    }
}

// --- With 变换器实现 ---

impl Uri {
    /// 替换协议：转为小写并去掉结尾的 `:` 或 `://`；非空时必须是 `http` 或 `https`。
    pub fn with_scheme(&self, scheme: &str) -> Result<Self, Exception> {
        let scheme = normalize_scheme(scheme)?;
        if scheme == self.inner.scheme {
            return Ok(self.clone());
        }
        Ok(self.derive(|parts| parts.scheme = scheme))
    }

    /// 替换用户信息；`user` 为空时清空用户信息，忽略密码。
    pub fn with_user_info(&self, user: &str, password: Option<&str>) -> Self {
        let user_info = normalize_user_info(user, password);
        if user_info == self.inner.user_info {
            return self.clone();
        }
        self.derive(|parts| parts.user_info = user_info)
    }

    /// 替换主机名，只做小写转换。
    pub fn with_host(&self, host: &str) -> Self {
        let host = normalize_host(host);
        if host == self.inner.host {
            return self.clone();
        }
        self.derive(|parts| parts.host = host)
    }

    /// 替换端口；`None` 清除端口，其他值必须位于 1-65535。
    pub fn with_port(&self, port: Option<i64>) -> Result<Self, Exception> {
        let port = match port {
            Some(port) => Some(normalize_port(port)?),
            None => None,
        };
        if port == self.inner.port {
            return Ok(self.clone());
        }
        Ok(self.derive(|parts| parts.port = port))
    }

    /// 以数字字符串形式替换端口，例如来自服务器参数的 `"8080"`。
    pub fn with_port_str(&self, port: &str) -> Result<Self, Exception> {
        let port = parse_port(port)?;
        self.with_port(Some(port as i64))
    }

    pub fn with_path(&self, path: &str) -> Self {
        let path = normalize_path(path);
        if path == self.inner.path {
            return self.clone();
        }
        self.derive(|parts| parts.path = path)
    }

    /// 替换查询串，开头的一个 `?` 会被去掉。
    pub fn with_query(&self, query: &str) -> Self {
        let query = normalize_query(query);
        if query == self.inner.query {
            return self.clone();
        }
        self.derive(|parts| parts.query = query)
    }

    /// 替换片段，开头的一个 `#` 会被去掉。
    pub fn with_fragment(&self, fragment: &str) -> Self {
        let fragment = normalize_fragment(fragment);
        if fragment == self.inner.fragment {
            return self.clone();
        }
        self.derive(|parts| parts.fragment = fragment)
    }
}

// --- 规范化函数 ---

fn normalize_scheme(scheme: &str) -> Result<String, Exception> {
    let scheme = SCHEME_SUFFIX
        .replace(&scheme.to_lowercase(), "")
        .into_owned();
    if scheme.is_empty() {
        return Ok(scheme);
    }
    if !SCHEMES.contains_key(scheme.as_str()) {
        return Err(Exception::UnsupportedScheme(scheme));
    }
    Ok(scheme)
}

fn normalize_user_info(user: &str, password: Option<&str>) -> String {
    if user.is_empty() {
        return String::new();
    }
    let mut user_info = encode(user, Component::UserInfo);
    if let Some(password) = password {
        user_info.push(':');
        user_info.push_str(&encode(password, Component::UserInfo));
    }
    user_info
}

fn normalize_host(host: &str) -> String {
    host.to_lowercase()
}

fn normalize_port(port: i64) -> Result<u16, Exception> {
    if !(1..=65535).contains(&port) {
        return Err(Exception::InvalidPort(port.to_string()));
    }
    Ok(port as u16)
}

fn parse_port(port: &str) -> Result<u16, Exception> {
    let value = port
        .parse::<i64>()
        .map_err(|_| Exception::InvalidPort(port.to_string()))?;
    normalize_port(value)
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return path.to_string();
    }
    let path = encode(path, Component::Path);
    if path.starts_with('/') {
        // 多个前导斜杠合并为一个，避免被误读为 authority
        return format!("/{}", path.trim_start_matches('/'));
    }
    path
}

fn normalize_query(query: &str) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    encode(query, Component::Query)
}

fn normalize_fragment(fragment: &str) -> String {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    encode(fragment, Component::Fragment)
}

/// 拆分 `host[:port]`，支持 `[v6]` 字面量
fn split_host_port(host_port: &str) -> Option<(&str, Option<&str>)> {
    if host_port.starts_with('[') {
        let end = host_port.find(']')?;
        let host = &host_port[..=end];
        let rest = &host_port[end + 1..];
        return match rest.strip_prefix(':') {
            Some(port) => Some((host, Some(port))),
            None if rest.is_empty() => Some((host, None)),
            None => None,
        };
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) => Some((host, Some(port))),
        None => Some((host_port, None)),
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uri")
            .field("scheme", &self.inner.scheme)
            .field("user_info", &self.inner.user_info)
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("path", &self.inner.path)
            .field("query", &self.inner.query)
            .field("fragment", &self.inner.fragment)
            .finish()
    }
}

/// 两个 URI 的所有组成部分相同即视为相等，与是否共享数据无关
impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.inner, &other.inner);
        a.scheme == b.scheme
            && a.user_info == b.user_info
            && a.host == b.host
            && a.port == b.port
            && a.path == b.path
            && a.query == b.query
            && a.fragment == b.fragment
    }
}

impl Eq for Uri {}

impl FromStr for Uri {
    type Err = Exception;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = Exception;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Uri::parse(s)
    }
}
