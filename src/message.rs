// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 消息公共行为
//!
//! 协议版本、标头与消息体是所有 HTTP 消息共有的部分。实现 [`Message`] 的类型只需要
//! 暴露自己的 [`MessageHead`]，就能获得一整套写时复制的 `with_*` 方法。

use crate::{
    exception::Exception,
    header::Headers,
    param::PROTOCOL_VERSIONS,
    stream::SharedStream,
};

/// 消息的协议版本、标头与消息体
#[derive(Debug, Clone)]
pub struct MessageHead {
    pub(crate) protocol: String,
    pub(crate) headers: Headers,
    pub(crate) body: SharedStream,
}

impl MessageHead {
    pub(crate) fn new(protocol: &str, headers: Headers, body: SharedStream) -> Result<Self, Exception> {
        validate_protocol(protocol)?;
        Ok(Self {
            protocol: protocol.to_string(),
            headers,
            body,
        })
    }
}

pub(crate) fn validate_protocol(version: &str) -> Result<(), Exception> {
    if !PROTOCOL_VERSIONS.contains(&version) {
        return Err(Exception::UnsupportedProtocolVersion(version.to_string()));
    }
    Ok(())
}

/// 不可变 HTTP 消息的公共接口。
///
/// 所有 `with_*` 方法都不会修改 `self`，而是返回修改后的副本；
/// 修改没有实际效果时返回与 `self` 共享数据的克隆。
pub trait Message: Clone {
    fn head(&self) -> &MessageHead;

    /// 返回可写的消息头；实现方负责在数据被共享时先行复制
    fn head_mut(&mut self) -> &mut MessageHead;

    fn protocol_version(&self) -> &str {
        &self.head().protocol
    }

    fn with_protocol_version(&self, version: &str) -> Result<Self, Exception> {
        validate_protocol(version)?;
        if version == self.head().protocol {
            return Ok(self.clone());
        }
        let mut new = self.clone();
        new.head_mut().protocol = version.to_string();
        Ok(new)
    }

    fn headers(&self) -> &Headers {
        &self.head().headers
    }

    fn has_header(&self, name: &str) -> bool {
        self.head().headers.contains(name)
    }

    fn header(&self, name: &str) -> &[String] {
        self.head().headers.get(name)
    }

    fn header_line(&self, name: &str) -> String {
        self.head().headers.line(name)
    }

    /// 替换标头的全部值
    fn with_header<V>(&self, name: &str, values: V) -> Result<Self, Exception>
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let mut headers = self.head().headers.clone();
        headers.set(name, values)?;
        let mut new = self.clone();
        new.head_mut().headers = headers;
        Ok(new)
    }

    /// 在已有值之后追加
    fn with_added_header<V>(&self, name: &str, values: V) -> Result<Self, Exception>
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let mut headers = self.head().headers.clone();
        headers.append(name, values)?;
        let mut new = self.clone();
        new.head_mut().headers = headers;
        Ok(new)
    }

    fn without_header(&self, name: &str) -> Self {
        if !self.has_header(name) {
            return self.clone();
        }
        let mut new = self.clone();
        new.head_mut().headers.remove(name);
        new
    }

    fn body(&self) -> &SharedStream {
        &self.head().body
    }

    fn with_body(&self, body: SharedStream) -> Self {
        if SharedStream::ptr_eq(&body, &self.head().body) {
            return self.clone();
        }
        let mut new = self.clone();
        new.head_mut().body = body;
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;
    use std::sync::Arc;

    /// 只包含消息头的最小实现
    #[derive(Debug, Clone)]
    struct Bare {
        head: Arc<MessageHead>,
    }

    impl Message for Bare {
        fn head(&self) -> &MessageHead {
            &self.head
        }

        fn head_mut(&mut self) -> &mut MessageHead {
            Arc::make_mut(&mut self.head)
        }
    }

    fn bare() -> Bare {
        let head = MessageHead::new("1.1", Headers::new(), Stream::memory().into()).unwrap();
        Bare {
            head: Arc::new(head),
        }
    }

    #[test]
    fn test_protocol_version() {
        let message = bare();
        assert_eq!(message.protocol_version(), "1.1");

        let v2 = message.with_protocol_version("2").unwrap();
        assert_eq!(v2.protocol_version(), "2");
        assert_eq!(message.protocol_version(), "1.1");

        let same = message.with_protocol_version("1.1").unwrap();
        assert!(Arc::ptr_eq(&same.head, &message.head));

        assert!(matches!(
            message.with_protocol_version("1.2"),
            Err(Exception::UnsupportedProtocolVersion(_))
        ));
    }

    #[test]
    fn test_header_withers_copy_on_write() {
        let message = bare();
        let with = message.with_header("X-Id", ["1"]).unwrap();
        let added = with.with_added_header("x-id", ["2"]).unwrap();

        assert!(!message.has_header("x-id"));
        assert_eq!(with.header("X-ID"), ["1".to_string()]);
        assert_eq!(added.header_line("x-id"), "1, 2");

        let removed = added.without_header("X-Id");
        assert!(!removed.has_header("x-id"));
        assert!(added.has_header("x-id"));

        let untouched = removed.without_header("X-Id");
        assert!(Arc::ptr_eq(&untouched.head, &removed.head));
    }

    #[test]
    fn test_invalid_header_leaves_original() {
        let message = bare();
        assert!(message.with_header("Bad Header", ["x"]).is_err());
        assert!(message.with_added_header("X-Ok", ["bad\nvalue"]).is_err());
        assert!(message.headers().is_empty());
    }

    #[test]
    fn test_with_body() {
        let message = bare();
        let same = message.with_body(message.body().clone());
        assert!(Arc::ptr_eq(&same.head, &message.head));

        let other: SharedStream = Stream::from_bytes("new").into();
        let changed = message.with_body(other.clone());
        assert!(SharedStream::ptr_eq(changed.body(), &other));
        assert!(!SharedStream::ptr_eq(message.body(), &other));
    }
}
