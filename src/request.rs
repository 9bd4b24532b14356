// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务端请求模块
//!
//! `ServerRequest` 是一个不可变的请求值对象，聚合了：
//! 1. 请求方法、目标 URI 与可选的请求目标覆盖值。
//! 2. 标头、消息体与协议版本（见 [`Message`]）。
//! 3. 服务器参数、Cookie、查询参数、解析后的请求体与上传文件树。
//! 4. 供应用在请求范围内传递数据的属性（attributes）。
//!
//! 每个 `with_*` 都返回新实例，原实例保持不变。只要请求中没有 `Host` 标头，
//! 就会根据 URI 的主机名和非标准端口合成一个。

use std::sync::Arc;

use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    exception::Exception,
    header::Headers,
    message::{Message, MessageHead},
    param::{is_standard_port, DEFAULT_METHOD, DEFAULT_PROTOCOL_VERSION, HOST_HEADER},
    stream::{SharedStream, Stream},
    upload::UploadedFiles,
    uri::Uri,
};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s").unwrap();
}

/// 服务器参数、Cookie、查询参数与属性使用的不透明映射
pub type Params = Map<String, Value>;

/// 构造请求时的 URI 参数
#[derive(Debug, Clone)]
pub enum UriInit {
    Text(String),
    Uri(Uri),
}

impl From<&str> for UriInit {
    fn from(uri: &str) -> Self {
        UriInit::Text(uri.to_string())
    }
}

impl From<String> for UriInit {
    fn from(uri: String) -> Self {
        UriInit::Text(uri)
    }
}

impl From<Uri> for UriInit {
    fn from(uri: Uri) -> Self {
        UriInit::Uri(uri)
    }
}

/// 构造请求时的消息体参数
#[derive(Debug)]
pub enum BodyInit {
    /// 以这些字节为内容的内存流
    Content(Bytes),
    Stream(SharedStream),
}

impl From<Stream> for BodyInit {
    fn from(stream: Stream) -> Self {
        BodyInit::Stream(stream.into())
    }
}

impl From<SharedStream> for BodyInit {
    fn from(stream: SharedStream) -> Self {
        BodyInit::Stream(stream)
    }
}

impl From<&str> for BodyInit {
    fn from(content: &str) -> Self {
        BodyInit::Content(Bytes::copy_from_slice(content.as_bytes()))
    }
}

impl From<Vec<u8>> for BodyInit {
    fn from(content: Vec<u8>) -> Self {
        BodyInit::Content(Bytes::from(content))
    }
}

/// 构造 `ServerRequest` 所需的全部原始输入
#[derive(Debug)]
pub struct RequestInit {
    pub server_params: Params,
    pub uploaded_files: UploadedFiles,
    pub cookie_params: Params,
    pub query_params: Params,
    pub parsed_body: Value,
    pub method: String,
    pub uri: Option<UriInit>,
    pub headers: Vec<(String, Vec<String>)>,
    pub body: Option<BodyInit>,
    pub protocol: String,
}

impl Default for RequestInit {
    fn default() -> Self {
        Self {
            server_params: Params::new(),
            uploaded_files: UploadedFiles::new(),
            cookie_params: Params::new(),
            query_params: Params::new(),
            parsed_body: Value::Null,
            method: DEFAULT_METHOD.to_string(),
            uri: None,
            headers: Vec::new(),
            body: None,
            protocol: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct RequestState {
    head: MessageHead,
    method: String,
    uri: Uri,
    /// 显式设置的请求目标，优先于由 URI 推导的目标
    request_target: Option<String>,
    server_params: Params,
    cookie_params: Params,
    query_params: Params,
    parsed_body: Value,
    uploaded_files: UploadedFiles,
    attributes: Params,
}

impl RequestState {
    /// 用 URI 的主机与非标准端口覆盖 `Host` 标头；URI 没有主机时保持不变
    fn update_host_from_uri(&mut self) {
        let host = self.uri.host();
        if host.is_empty() {
            return;
        }
        let mut value = host.to_string();
        if let Some(port) = self.uri.port() {
            if !is_standard_port(self.uri.scheme(), port) {
                value.push(':');
                value.push_str(&port.to_string());
            }
        }
        self.head.headers.set_first(HOST_HEADER, value);
    }
}

/// 不可变的服务端 HTTP 请求
#[derive(Debug, Clone)]
pub struct ServerRequest {
    inner: Arc<RequestState>,
}

impl ServerRequest {
    /// 以给定方法和 URI 构造请求，其余部分使用默认值
    pub fn new(method: &str, uri: impl Into<UriInit>) -> Result<Self, Exception> {
        Self::from_init(RequestInit {
            method: method.to_string(),
            uri: Some(uri.into()),
            ..Default::default()
        })
    }

    pub fn from_init(init: RequestInit) -> Result<Self, Exception> {
        validate_parsed_body(&init.parsed_body)?;

        let uri = match init.uri {
            None => Uri::new(),
            Some(UriInit::Text(text)) => Uri::parse(&text)?,
            Some(UriInit::Uri(uri)) => uri,
        };
        let body = match init.body {
            None => SharedStream::new(Stream::memory()),
            Some(BodyInit::Content(content)) => SharedStream::new(Stream::from_bytes(content.to_vec())),
            Some(BodyInit::Stream(stream)) => stream,
        };
        let headers = Headers::from_pairs(init.headers)?;
        let head = MessageHead::new(&init.protocol, headers, body)?;

        let mut state = RequestState {
            head,
            method: init.method,
            uri,
            request_target: None,
            server_params: init.server_params,
            cookie_params: init.cookie_params,
            query_params: init.query_params,
            parsed_body: init.parsed_body,
            uploaded_files: init.uploaded_files,
            attributes: Params::new(),
        };
        if !state.head.headers.contains(HOST_HEADER) {
            state.update_host_from_uri();
        }

        Ok(Self {
            inner: Arc::new(state),
        })
    }

    /// 判断两个请求是否共享同一份数据（即 `with_*` 短路返回了原实例）
    pub fn ptr_eq(a: &ServerRequest, b: &ServerRequest) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn derive(&self, update: impl FnOnce(&mut RequestState)) -> Self {
        let mut state = (*self.inner).clone();
        update(&mut state);
        Self {
            inner: Arc::new(state),
        }
    }
}

impl Message for ServerRequest {
    fn head(&self) -> &MessageHead {
        &self.inner.head
    }

    fn head_mut(&mut self) -> &mut MessageHead {
        &mut Arc::make_mut(&mut self.inner).head
    }
}

// --- 请求行 ---

impl ServerRequest {
    /// 请求目标：显式设置的值优先；否则为 URI 的 `path[?query]`，路径为空时使用 `/`。
    pub fn request_target(&self) -> String {
        if let Some(target) = &self.inner.request_target {
            return target.clone();
        }
        let path = self.inner.uri.path();
        let query = self.inner.uri.query();

        let mut target = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
        if !query.is_empty() {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    /// 显式设置请求目标（例如 `*` 或 absolute-form）；不允许包含空白字符。
    pub fn with_request_target(&self, target: &str) -> Result<Self, Exception> {
        if self.inner.request_target.as_deref() == Some(target) {
            return Ok(self.clone());
        }
        if WHITESPACE.is_match(target) {
            return Err(Exception::InvalidRequestTarget(target.to_string()));
        }
        Ok(self.derive(|state| state.request_target = Some(target.to_string())))
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// 替换请求方法，不校验取值
    pub fn with_method(&self, method: &str) -> Self {
        if method == self.inner.method {
            return self.clone();
        }
        self.derive(|state| state.method = method.to_string())
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// 替换 URI。除非 `preserve_host` 为真且已经存在 `Host` 标头，否则根据新 URI 更新 `Host`。
    /// 显式设置的请求目标不受影响。
    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        if Uri::ptr_eq(&uri, &self.inner.uri) {
            return self.clone();
        }
        let keep_host = preserve_host && self.has_header(HOST_HEADER);
        self.derive(|state| {
            state.uri = uri;
            if !keep_host {
                state.update_host_from_uri();
            }
        })
    }
}

// --- 服务端参数 ---

impl ServerRequest {
    pub fn server_params(&self) -> &Params {
        &self.inner.server_params
    }

    pub fn cookie_params(&self) -> &Params {
        &self.inner.cookie_params
    }

    pub fn with_cookie_params(&self, cookies: Params) -> Self {
        self.derive(|state| state.cookie_params = cookies)
    }

    pub fn query_params(&self) -> &Params {
        &self.inner.query_params
    }

    pub fn with_query_params(&self, query: Params) -> Self {
        self.derive(|state| state.query_params = query)
    }

    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.inner.uploaded_files
    }

    pub fn with_uploaded_files(&self, files: UploadedFiles) -> Self {
        self.derive(|state| state.uploaded_files = files)
    }

    /// 解析后的请求体：`Null`、对象或数组
    pub fn parsed_body(&self) -> &Value {
        &self.inner.parsed_body
    }

    pub fn with_parsed_body(&self, data: Value) -> Result<Self, Exception> {
        validate_parsed_body(&data)?;
        Ok(self.derive(|state| state.parsed_body = data))
    }
}

// --- 属性 ---

impl ServerRequest {
    pub fn attributes(&self) -> &Params {
        &self.inner.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.inner.attributes.get(name)
    }

    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.inner.attributes.get(name).unwrap_or(default)
    }

    pub fn with_attribute(&self, name: &str, value: Value) -> Self {
        if self.inner.attributes.get(name) == Some(&value) {
            return self.clone();
        }
        self.derive(|state| {
            state.attributes.insert(name.to_string(), value);
        })
    }

    pub fn without_attribute(&self, name: &str) -> Self {
        if !self.inner.attributes.contains_key(name) {
            return self.clone();
        }
        self.derive(|state| {
            state.attributes.remove(name);
        })
    }
}

fn validate_parsed_body(data: &Value) -> Result<(), Exception> {
    match data {
        Value::Null | Value::Object(_) | Value::Array(_) => Ok(()),
        Value::Bool(_) => Err(Exception::InvalidParsedBody("boolean")),
        Value::Number(_) => Err(Exception::InvalidParsedBody("number")),
        Value::String(_) => Err(Exception::InvalidParsedBody("string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let request = ServerRequest::from_init(RequestInit::default()).unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.protocol_version(), "1.1");
        assert_eq!(request.uri(), &Uri::new());
        assert_eq!(request.request_target(), "/");
        assert!(request.headers().is_empty());
        assert_eq!(request.parsed_body(), &Value::Null);
        assert!(request.body().lock().is_writable());
    }

    #[test]
    fn test_host_header_synthesized() {
        let request = ServerRequest::new("GET", "https://api.example.com/users").unwrap();
        assert_eq!(request.header_line("host"), "api.example.com");
        assert_eq!(request.headers().original_name("HOST"), Some("Host"));
    }

    #[test]
    fn test_host_header_includes_non_standard_port() {
        let request = ServerRequest::new("GET", "http://example.com:8080/").unwrap();
        assert_eq!(request.header_line("Host"), "example.com:8080");

        let standard = ServerRequest::new("GET", "https://example.com:443/").unwrap();
        assert_eq!(standard.header_line("Host"), "example.com");
    }

    #[test]
    fn test_explicit_host_suppresses_synthesis() {
        let request = ServerRequest::from_init(RequestInit {
            uri: Some("http://api.example.com/".into()),
            headers: vec![("host".to_string(), vec!["proxy.local".to_string()])],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(request.header("Host"), ["proxy.local".to_string()]);
    }

    #[test]
    fn test_with_uri_host_handling() {
        let request = ServerRequest::new("GET", "http://one.example.com/").unwrap();
        let other = Uri::parse("http://two.example.com/").unwrap();

        let replaced = request.with_uri(other.clone(), false);
        assert_eq!(replaced.header_line("host"), "two.example.com");

        let preserved = request.with_uri(other, true);
        assert_eq!(preserved.header_line("host"), "one.example.com");
        assert_eq!(preserved.uri().host(), "two.example.com");

        let same = request.with_uri(request.uri().clone(), false);
        assert!(ServerRequest::ptr_eq(&same, &request));
    }

    #[test]
    fn test_with_uri_preserve_host_without_existing_header() {
        let request = ServerRequest::new("GET", "/relative").unwrap();
        assert!(!request.has_header("host"));

        let updated = request.with_uri(Uri::parse("http://late.example.com").unwrap(), true);
        assert_eq!(updated.header_line("host"), "late.example.com");
    }

    #[test]
    fn test_request_target() {
        let request = ServerRequest::new("GET", "http://example.com/search?q=1").unwrap();
        assert_eq!(request.request_target(), "/search?q=1");

        let query_only = ServerRequest::new("GET", "http://example.com?q=1").unwrap();
        assert_eq!(query_only.request_target(), "/?q=1");

        let custom = request.with_request_target("/custom").unwrap();
        assert_eq!(custom.request_target(), "/custom");
        assert_eq!(request.request_target(), "/search?q=1");

        let moved = custom.with_uri(Uri::parse("http://example.com/elsewhere").unwrap(), false);
        assert_eq!(moved.request_target(), "/custom");

        let same = custom.with_request_target("/custom").unwrap();
        assert!(ServerRequest::ptr_eq(&same, &custom));

        let err = request.with_request_target("/has space").unwrap_err();
        assert!(err.is_invalid_input());
        assert!(request.with_request_target("/tab\there").is_err());
    }

    #[test]
    fn test_with_method() {
        let request = ServerRequest::new("GET", "/").unwrap();
        let post = request.with_method("post");
        assert_eq!(post.method(), "post");
        assert_eq!(request.method(), "GET");
        assert!(ServerRequest::ptr_eq(&request, &request.with_method("GET")));
    }

    #[test]
    fn test_parsed_body_validation() {
        let request = ServerRequest::new("POST", "/").unwrap();

        let with_map = request.with_parsed_body(json!({"name": "value"})).unwrap();
        assert_eq!(with_map.parsed_body()["name"], "value");
        assert!(request.with_parsed_body(json!([1, 2])).is_ok());
        assert!(request.with_parsed_body(Value::Null).is_ok());

        assert_eq!(
            request.with_parsed_body(json!("text")).unwrap_err(),
            Exception::InvalidParsedBody("string")
        );
        assert!(request.with_parsed_body(json!(42)).is_err());
        assert!(request.with_parsed_body(json!(true)).is_err());

        let init = RequestInit {
            parsed_body: json!(1.5),
            ..Default::default()
        };
        assert!(ServerRequest::from_init(init).is_err());
    }

    #[test]
    fn test_attributes() {
        let request = ServerRequest::new("GET", "/").unwrap();
        let with = request.with_attribute("user_id", json!(42));

        assert_eq!(with.attribute("user_id"), Some(&json!(42)));
        assert_eq!(request.attribute("user_id"), None);
        let fallback = json!("guest");
        assert_eq!(request.attribute_or("user_id", &fallback), &fallback);

        assert!(ServerRequest::ptr_eq(&with, &with.with_attribute("user_id", json!(42))));
        assert!(!ServerRequest::ptr_eq(&with, &with.with_attribute("user_id", json!(43))));

        let without = with.without_attribute("user_id");
        assert!(without.attributes().is_empty());
        assert!(ServerRequest::ptr_eq(&without, &without.without_attribute("user_id")));
    }

    #[test]
    fn test_params_copy_on_write() {
        let mut cookies = Params::new();
        cookies.insert("session".to_string(), json!("abc"));
        let mut query = Params::new();
        query.insert("page".to_string(), json!("2"));

        let request = ServerRequest::new("GET", "/").unwrap();
        let updated = request.with_cookie_params(cookies).with_query_params(query);

        assert_eq!(updated.cookie_params()["session"], "abc");
        assert_eq!(updated.query_params()["page"], "2");
        assert!(request.cookie_params().is_empty());
        assert!(request.query_params().is_empty());
    }

    #[test]
    fn test_body_content() {
        let request = ServerRequest::from_init(RequestInit {
            body: Some("a=1&b=2".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(request.body().lock().to_bytes().unwrap(), Bytes::from("a=1&b=2"));
    }

    #[test]
    fn test_invalid_protocol_and_headers() {
        let bad_protocol = RequestInit {
            protocol: "0.9".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ServerRequest::from_init(bad_protocol),
            Err(Exception::UnsupportedProtocolVersion(_))
        ));

        let bad_header = RequestInit {
            headers: vec![("X-Bad".to_string(), vec!["a\r\nb".to_string()])],
            ..Default::default()
        };
        assert!(ServerRequest::from_init(bad_header).is_err());
    }

    #[test]
    fn test_header_wither_does_not_touch_original() {
        let request = ServerRequest::new("GET", "http://example.com/").unwrap();
        let tagged = request.with_header("X-Trace", ["t1"]).unwrap();
        assert!(tagged.has_header("x-trace"));
        assert!(!request.has_header("x-trace"));
        assert_eq!(tagged.header_line("host"), "example.com");
    }
}
