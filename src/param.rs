// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 消息协议参数与常量模块
//!
//! 该模块集中定义了 URI 与 HTTP 消息对象共同遵循的常量和数据结构，包括：
//! - 支持的协议（scheme）及其标准端口。
//! - 允许的 HTTP 协议版本。
//! - 各个 URI 组成部分允许出现的字符类（RFC 3986）。
//! - 上传文件状态码的强类型枚举。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::exception::Exception;

/// 未指定时使用的请求方法
pub const DEFAULT_METHOD: &str = "GET";

/// 未指定时使用的 HTTP 协议版本
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.1";

/// 允许的 HTTP 协议版本
pub const PROTOCOL_VERSIONS: [&str; 5] = ["1.0", "1.1", "2", "2.0", "3"];

/// 由 URI 合成 `Host` 标头时使用的标头名
pub const HOST_HEADER: &str = "Host";

/// 移动基于流的上传文件时，每次复制的字节数
pub const UPLOAD_CHUNK_SIZE: usize = 512000;

/// 用户信息（user-info）中无需编码的字符：unreserved + sub-delims
pub const USER_INFO_CHARS: &str = r"a-zA-Z0-9_\-\.~!\$&'\(\)\*\+,;=";

/// 路径（path）中无需编码的字符
pub const PATH_CHARS: &str = r"a-zA-Z0-9_\-\.~:@&=\+\$,/;";

/// 查询串（query）与片段（fragment）中无需编码的字符
pub const QUERY_FRAGMENT_CHARS: &str = r"a-zA-Z0-9_\-\.~!\$&'\(\)\*\+,;=:@/\?";

lazy_static! {
    /// 支持的协议与其标准端口的映射表。
    ///
    /// 协议不在该表中的 URI 会被拒绝；端口与协议的标准端口一致时不会出现在 authority 中。
    pub static ref SCHEMES: HashMap<&'static str, u16> = {
        let mut map = HashMap::new();
        map.insert("http", 80);
        map.insert("https", 443);
        map
    };
}

/// 判断 `port` 是否为 `scheme` 的标准端口。
pub fn is_standard_port(scheme: &str, port: u16) -> bool {
    SCHEMES.get(scheme) == Some(&port)
}

/// 上传文件的状态码，对应 `UPLOAD_ERR_*` 常量。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorCode {
    /// 文件上传成功
    Ok,
    /// 超过了服务端配置的最大尺寸
    IniSize,
    /// 超过了表单中声明的 MAX_FILE_SIZE
    FormSize,
    /// 文件只上传了一部分
    Partial,
    /// 没有文件被上传
    NoFile,
    /// 缺少临时目录
    NoTmpDir,
    /// 写入磁盘失败
    CantWrite,
    /// 上传被扩展中止
    Extension,
}

impl UploadErrorCode {
    /// 从数字状态码构造；6 之前没有 5，这与 `UPLOAD_ERR_*` 的定义一致。
    pub fn from_code(code: i64) -> Result<Self, Exception> {
        match code {
            0 => Ok(UploadErrorCode::Ok),
            1 => Ok(UploadErrorCode::IniSize),
            2 => Ok(UploadErrorCode::FormSize),
            3 => Ok(UploadErrorCode::Partial),
            4 => Ok(UploadErrorCode::NoFile),
            6 => Ok(UploadErrorCode::NoTmpDir),
            7 => Ok(UploadErrorCode::CantWrite),
            8 => Ok(UploadErrorCode::Extension),
            _ => Err(Exception::InvalidUploadStatus(code)),
        }
    }

    pub fn code(&self) -> u8 {
        match *self {
            UploadErrorCode::Ok => 0,
            UploadErrorCode::IniSize => 1,
            UploadErrorCode::FormSize => 2,
            UploadErrorCode::Partial => 3,
            UploadErrorCode::NoFile => 4,
            UploadErrorCode::NoTmpDir => 6,
            UploadErrorCode::CantWrite => 7,
            UploadErrorCode::Extension => 8,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == UploadErrorCode::Ok
    }

    /// 状态码对应的人类可读描述
    pub fn description(&self) -> &'static str {
        match *self {
            UploadErrorCode::Ok => "The file was uploaded without errors.",
            UploadErrorCode::IniSize => "The uploaded file exceeds the maximum upload size of the server.",
            UploadErrorCode::FormSize => {
                "The uploaded file exceeds the MAX_FILE_SIZE directive specified in the HTML form."
            }
            UploadErrorCode::Partial => "The uploaded file was only partially uploaded.",
            UploadErrorCode::NoFile => "No file was uploaded.",
            UploadErrorCode::NoTmpDir => "Missing a temporary folder.",
            UploadErrorCode::CantWrite => "Failed to write file to disk.",
            UploadErrorCode::Extension => "A server extension stopped the file upload.",
        }
    }
}

impl fmt::Display for UploadErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_ports() {
        assert!(is_standard_port("http", 80));
        assert!(is_standard_port("https", 443));
        assert!(!is_standard_port("http", 443));
        assert!(!is_standard_port("", 80));
    }

    #[test]
    fn test_upload_codes() {
        for code in [0, 1, 2, 3, 4, 6, 7, 8] {
            assert_eq!(UploadErrorCode::from_code(code).unwrap().code() as i64, code);
        }
        assert_eq!(
            UploadErrorCode::from_code(5),
            Err(Exception::InvalidUploadStatus(5))
        );
        assert!(UploadErrorCode::from_code(-1).is_err());
        assert!(UploadErrorCode::Ok.is_ok());
        assert!(!UploadErrorCode::NoFile.is_ok());
    }
}
