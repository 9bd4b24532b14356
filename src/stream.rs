// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 字节流模块
//!
//! `Stream` 把文件或内存缓冲区包装成统一的读、写、定位接口，作为请求体和上传文件的载体。
//! 与值对象不同，流会执行阻塞 I/O 并持有可变的读写位置，多个写入方不应同时共享同一个流。

use std::{
    fs::{File, OpenOptions},
    io::{self, Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use log::{error, warn};
use serde_derive::Serialize;
use serde_json::Value;

use crate::exception::Exception;

/// 流背后的实际资源
#[derive(Debug)]
pub enum Resource {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl Resource {
    fn reader(&mut self) -> &mut dyn Read {
        match self {
            Resource::File(f) => f,
            Resource::Memory(c) => c,
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Resource::File(f) => f,
            Resource::Memory(c) => c,
        }
    }

    fn seeker(&mut self) -> &mut dyn Seek {
        match self {
            Resource::File(f) => f,
            Resource::Memory(c) => c,
        }
    }

    fn len(&self) -> io::Result<u64> {
        match self {
            Resource::File(f) => Ok(f.metadata()?.len()),
            Resource::Memory(c) => Ok(c.get_ref().len() as u64),
        }
    }
}

/// `metadata` 返回的流元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamMetadata {
    pub stream_type: &'static str,
    pub mode: String,
    pub seekable: bool,
    pub uri: String,
}

/// 可读写、可定位的字节流
#[derive(Debug)]
pub struct Stream {
    resource: Option<Resource>,
    mode: String,
    uri: String,
}

impl Stream {
    /// 可读、可写、可定位的临时内存流
    pub fn memory() -> Self {
        Self {
            resource: Some(Resource::Memory(Cursor::new(Vec::new()))),
            mode: "w+b".to_string(),
            uri: "memory".to_string(),
        }
    }

    /// 预先装入 `content` 的内存流，读写位置位于开头
    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        Self {
            resource: Some(Resource::Memory(Cursor::new(content.into()))),
            mode: "r+b".to_string(),
            uri: "memory".to_string(),
        }
    }

    /// 以 `fopen` 风格的模式打开文件，例如 `"rb"`、`"w+"`、`"a"`。
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self, Exception> {
        let path = path.as_ref();
        let options = open_options(mode)?;
        let file = options.open(path).map_err(|e| {
            error!("无法以模式{}打开流{}：{}", mode, path.display(), e);
            Exception::io(e, &format!("Unable to open stream \"{}\"", path.display()))
        })?;
        Ok(Self {
            resource: Some(Resource::File(file)),
            mode: mode.to_string(),
            uri: path.display().to_string(),
        })
    }

    /// 包装一个已经打开的文件
    pub fn from_file(file: File, mode: &str) -> Result<Self, Exception> {
        open_options(mode)?;
        Ok(Self {
            resource: Some(Resource::File(file)),
            mode: mode.to_string(),
            uri: String::new(),
        })
    }

    fn resource(&mut self) -> Result<&mut Resource, Exception> {
        self.resource.as_mut().ok_or(Exception::StreamDetached)
    }

    pub fn is_readable(&self) -> bool {
        self.resource.is_some() && (self.mode.contains('r') || self.mode.contains('+'))
    }

    pub fn is_writable(&self) -> bool {
        self.resource.is_some() && self.mode.contains(['w', '+', 'x', 'c', 'a'])
    }

    /// 文件和内存资源都支持定位；分离后不可定位。
    pub fn is_seekable(&self) -> bool {
        self.resource.is_some()
    }

    /// 读取至多 `length` 个字节
    pub fn read(&mut self, length: usize) -> Result<Bytes, Exception> {
        if !self.is_readable() {
            return Err(self.misuse(Exception::StreamNotReadable));
        }
        let mut buf = Vec::with_capacity(length.min(64 * 1024));
        let reader = self.resource()?.reader();
        Read::take(reader, length as u64)
            .read_to_end(&mut buf)
            .map_err(|e| Exception::io(e, "Error reading from stream"))?;
        Ok(Bytes::from(buf))
    }

    /// 写入全部数据，返回写入的字节数
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Exception> {
        if !self.is_writable() {
            return Err(self.misuse(Exception::StreamNotWritable));
        }
        self.resource()?
            .writer()
            .write_all(data)
            .map_err(|e| Exception::io(e, "Error writing to stream"))?;
        Ok(data.len())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, Exception> {
        if !self.is_seekable() {
            return Err(self.misuse(Exception::StreamNotSeekable));
        }
        self.resource()?
            .seeker()
            .seek(pos)
            .map_err(|e| Exception::io(e, "Error seeking within stream"))
    }

    pub fn rewind(&mut self) -> Result<(), Exception> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// 当前读写位置
    pub fn tell(&mut self) -> Result<u64, Exception> {
        self.resource()?
            .seeker()
            .stream_position()
            .map_err(|e| Exception::io(e, "Error determining stream position"))
    }

    /// 读写位置是否已到达末尾；已分离的流视为到达末尾
    pub fn eof(&mut self) -> bool {
        let Some(resource) = self.resource.as_mut() else {
            return true;
        };
        let len = match resource.len() {
            Ok(len) => len,
            Err(_) => return true,
        };
        match resource.seeker().stream_position() {
            Ok(pos) => pos >= len,
            Err(_) => true,
        }
    }

    /// 资源的总字节数；已分离时为 `None`
    pub fn size(&self) -> Option<u64> {
        self.resource.as_ref().and_then(|r| r.len().ok())
    }

    /// 从当前位置读取剩余的全部内容
    pub fn contents(&mut self) -> Result<Bytes, Exception> {
        if !self.is_readable() {
            return Err(self.misuse(Exception::StreamNotReadable));
        }
        let mut buf = Vec::new();
        self.resource()?
            .reader()
            .read_to_end(&mut buf)
            .map_err(|e| Exception::io(e, "Error reading stream"))?;
        Ok(Bytes::from(buf))
    }

    /// 回到开头并读取全部内容
    pub fn to_bytes(&mut self) -> Result<Bytes, Exception> {
        if self.is_seekable() {
            self.rewind()?;
        }
        self.contents()
    }

    /// 关闭并释放底层资源
    pub fn close(&mut self) {
        self.resource.take();
    }

    /// 分离底层资源，之后流处于不可用状态
    pub fn detach(&mut self) -> Option<Resource> {
        self.resource.take()
    }

    pub fn metadata(&self) -> Option<StreamMetadata> {
        let resource = self.resource.as_ref()?;
        Some(StreamMetadata {
            stream_type: match resource {
                Resource::File(_) => "STDIO",
                Resource::Memory(_) => "MEMORY",
            },
            mode: self.mode.clone(),
            seekable: self.is_seekable(),
            uri: self.uri.clone(),
        })
    }

    /// 按键读取单个元数据项
    pub fn metadata_value(&self, key: &str) -> Option<Value> {
        let metadata = serde_json::to_value(self.metadata()?).ok()?;
        metadata.get(key).cloned()
    }

    fn misuse(&self, exception: Exception) -> Exception {
        if self.resource.is_none() {
            return Exception::StreamDetached;
        }
        exception
    }
}

/// 把 `fopen` 风格的模式转换为 `OpenOptions`
fn open_options(mode: &str) -> Result<OpenOptions, Exception> {
    let flags: String = mode.chars().filter(|c| *c != 'b' && *c != 't').collect();
    let mut options = OpenOptions::new();
    match flags.as_str() {
        "r" => options.read(true),
        "r+" => options.read(true).write(true),
        "w" => options.write(true).create(true).truncate(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        "a+" => options.read(true).append(true).create(true),
        "x" => options.write(true).create_new(true),
        "x+" => options.read(true).write(true).create_new(true),
        "c" => options.write(true).create(true),
        "c+" => options.read(true).write(true).create(true),
        _ => return Err(Exception::InvalidStreamMode(mode.to_string())),
    };
    Ok(options)
}

/// 可以在多个消息实例之间共享的流句柄
#[derive(Debug, Clone)]
pub struct SharedStream(Arc<Mutex<Stream>>);

impl SharedStream {
    pub fn new(stream: Stream) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }

    /// 获取流的独占访问；锁被污染时恢复并继续使用
    pub fn lock(&self) -> MutexGuard<'_, Stream> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("流的锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    /// 两个句柄是否指向同一个流
    pub fn ptr_eq(a: &SharedStream, b: &SharedStream) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl From<Stream> for SharedStream {
    fn from(stream: Stream) -> Self {
        SharedStream::new(stream)
    }
}
