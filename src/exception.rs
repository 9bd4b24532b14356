// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了消息对象在构造、变换以及 I/O 过程中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：每个变体都归入 [`ExceptionKind::InvalidInput`] 或
//!   [`ExceptionKind::RuntimeIo`] 两类之一，调用方可以据此决定如何处理。
//! - **就地失败**：所有异常都在违反约定的那次调用中同步返回，不会被延迟或内部重试。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::{fmt, io};

/// 异常的粗粒度分类。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExceptionKind {
    /// 调用方传入的参数不满足约定（格式、取值范围、类型）。
    InvalidInput,
    /// 流或文件系统层面的误用与失败。
    RuntimeIo,
}

/// 处理 HTTP 消息对象过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示失败的具体原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// URI 字符串无法拆分为合法的组成部分。
    MalformedUri(String),
    /// 协议不在支持列表（`http`、`https`）中。
    UnsupportedScheme(String),
    /// 端口不是 1-65535 之间的整数。
    InvalidPort(String),
    /// 请求目标包含空白字符。
    InvalidRequestTarget(String),
    /// 解析后的请求体既不是 null，也不是映射或结构化对象。
    InvalidParsedBody(&'static str),
    /// 上传文件树中出现了既不是文件描述也不是嵌套映射的值。
    InvalidUploadedFile(String),
    /// 上传状态码不在 `UPLOAD_ERR_*` 集合中。
    InvalidUploadStatus(i64),
    /// 移动上传文件时给出了空的目标路径。
    EmptyTargetPath,
    /// 标头名称不是合法的 token。
    InvalidHeaderName(String),
    /// 标头值中包含换行或 NUL 字符。
    InvalidHeaderValue(String),
    /// 不支持的 HTTP 协议版本。
    UnsupportedProtocolVersion(String),
    /// 无法识别的流打开模式。
    InvalidStreamMode(String),
    /// 缓存键为空或包含保留字符。
    InvalidCacheKey(String),
    /// 流已经被关闭或分离，没有可操作的底层资源。
    StreamDetached,
    /// 流不可读。
    StreamNotReadable,
    /// 流不可写。
    StreamNotWritable,
    /// 流不支持随机定位。
    StreamNotSeekable,
    /// 上传本身失败，携带对应状态码的描述。
    UploadFailed(&'static str),
    /// 上传文件已经被移动过，流和再次移动都不可用。
    UploadAlreadyMoved,
    /// 目标目录不存在或不可写。
    TargetDirectoryUnavailable(String),
    /// 底层文件系统调用失败。
    Io(io::ErrorKind, String),
    /// 日志配置无法载入。
    LoggerInit(String),
}

use Exception::*;

impl Exception {
    /// 返回该异常所属的分类。
    pub fn kind(&self) -> ExceptionKind {
        match self {
            MalformedUri(_)
            | UnsupportedScheme(_)
            | InvalidPort(_)
            | InvalidRequestTarget(_)
            | InvalidParsedBody(_)
            | InvalidUploadedFile(_)
            | InvalidUploadStatus(_)
            | EmptyTargetPath
            | InvalidHeaderName(_)
            | InvalidHeaderValue(_)
            | UnsupportedProtocolVersion(_)
            | InvalidStreamMode(_)
            | InvalidCacheKey(_) => ExceptionKind::InvalidInput,
            StreamDetached
            | StreamNotReadable
            | StreamNotWritable
            | StreamNotSeekable
            | UploadFailed(_)
            | UploadAlreadyMoved
            | TargetDirectoryUnavailable(_)
            | Io(..)
            | LoggerInit(_) => ExceptionKind::RuntimeIo,
        }
    }

    /// 携带上下文包装一个底层 I/O 错误。
    pub fn io(e: io::Error, context: &str) -> Self {
        Io(e.kind(), format!("{}: {}", context, e))
    }

    pub fn is_invalid_input(&self) -> bool {
        self.kind() == ExceptionKind::InvalidInput
    }

    pub fn is_runtime_io(&self) -> bool {
        self.kind() == ExceptionKind::RuntimeIo
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedUri(uri) => write!(f, "Malformed URI \"{}\"", uri),
            UnsupportedScheme(scheme) => write!(
                f,
                "Scheme \"{}\" is not supported; it must be empty or one of \"http\", \"https\"",
                scheme
            ),
            InvalidPort(port) => write!(
                f,
                "Invalid port \"{}\"; it must be an integer between 1 and 65535 or absent",
                port
            ),
            InvalidRequestTarget(target) => write!(
                f,
                "Invalid request target \"{}\"; it must not contain whitespace",
                target
            ),
            InvalidParsedBody(found) => write!(
                f,
                "Invalid parsed body of type {}; it must be null, a mapping or an object",
                found
            ),
            InvalidUploadedFile(path) => write!(
                f,
                "Invalid entry at \"{}\" in the uploaded files tree; expected an uploaded file or a nested mapping",
                path
            ),
            InvalidUploadStatus(code) => write!(
                f,
                "Invalid upload status {}; it must be one of 0, 1, 2, 3, 4, 6, 7, 8",
                code
            ),
            EmptyTargetPath => write!(f, "Target path for an uploaded file must be a non-empty string"),
            InvalidHeaderName(name) => write!(f, "Invalid header name \"{}\"", name),
            InvalidHeaderValue(value) => write!(f, "Invalid header value \"{}\"", value.escape_debug()),
            UnsupportedProtocolVersion(version) => {
                write!(f, "Unsupported HTTP protocol version \"{}\"", version)
            }
            InvalidStreamMode(mode) => write!(f, "Invalid stream mode \"{}\"", mode),
            InvalidCacheKey(key) => write!(f, "Invalid cache key \"{}\"", key),
            StreamDetached => write!(f, "No resource available; the stream is detached"),
            StreamNotReadable => write!(f, "Stream is not readable"),
            StreamNotWritable => write!(f, "Stream is not writable"),
            StreamNotSeekable => write!(f, "Stream is not seekable"),
            UploadFailed(reason) => write!(f, "{}", reason),
            UploadAlreadyMoved => write!(f, "Uploaded file has already been moved"),
            TargetDirectoryUnavailable(dir) => write!(
                f,
                "Target directory \"{}\" does not exist or is not writable",
                dir
            ),
            Io(_, message) => write!(f, "{}", message),
            LoggerInit(reason) => write!(f, "Unable to initialize logger from {}", reason),
        }
    }
}

impl std::error::Error for Exception {}

impl From<io::Error> for Exception {
    fn from(e: io::Error) -> Self {
        Io(e.kind(), e.to_string())
    }
}
