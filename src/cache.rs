// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use log::{debug, error};
use lru::LruCache;

use crate::{config::Config, exception::Exception};

/// PSR-16 保留的键字符
const RESERVED_KEY_CHARS: [char; 8] = ['{', '}', '(', ')', '/', '\\', '@', ':'];

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 以目录中的单个文件保存每个键的键值缓存。
///
/// 最近读取的值保存在内存 LRU 中，文件修改时间不变时直接命中内存。
pub struct FileCache {
    dir: PathBuf,
    memory: LruCache<String, CacheEntry>,
}

impl FileCache {
    // 目录不存在时创建
    pub fn new(dir: impl AsRef<Path>, capacity: NonZeroUsize) -> Result<Self, Exception> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            fs::create_dir_all(&dir).map_err(|e| {
                error!("无法创建缓存目录{}：{}", dir.display(), e);
                Exception::io(e, &format!("Unable to create cache directory \"{}\"", dir.display()))
            })?;
        }
        Ok(Self {
            dir,
            memory: LruCache::new(capacity),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        Self::new(config.cache_dir(), config.cache_capacity())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // 键对应的文件路径
    fn path_for(&self, key: &str) -> Result<PathBuf, Exception> {
        if key.is_empty() || key == "." || key == ".." || key.contains(RESERVED_KEY_CHARS) {
            return Err(Exception::InvalidCacheKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    // 查询；不存在时返回 None
    pub fn get(&mut self, key: &str) -> Result<Option<Bytes>, Exception> {
        let path = self.path_for(key)?;
        let metadata = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Exception::io(e, &format!("Unable to read cache key \"{}\"", key))),
        };
        let modified_time = metadata
            .modified()
            .map_err(|e| Exception::io(e, "Unable to read cache modification time"))?;

        if let Some(entry) = self.memory.get(key) {
            if entry.modified_time == modified_time {
                debug!("缓存键{}命中内存", key);
                return Ok(Some(entry.content.clone()));
            }
        }

        let content = Bytes::from(fs::read(&path).map_err(|e| {
            error!("无法读取缓存文件{}：{}", path.display(), e);
            Exception::io(e, &format!("Unable to read cache key \"{}\"", key))
        })?);
        self.push(key, content.clone(), modified_time);
        Ok(Some(content))
    }

    pub fn get_or(&mut self, key: &str, default: Bytes) -> Result<Bytes, Exception> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// 写入。`ttl` 会被接受但不会生效，条目不会过期。
    pub fn set(
        &mut self,
        key: &str,
        value: impl Into<Bytes>,
        ttl: Option<Duration>,
    ) -> Result<bool, Exception> {
        let path = self.path_for(key)?;
        let content: Bytes = value.into();
        if let Some(ttl) = ttl {
            debug!("缓存键{}的TTL({:?})不会生效", key, ttl);
        }

        fs::write(&path, &content).map_err(|e| {
            error!("无法写入缓存文件{}：{}", path.display(), e);
            Exception::io(e, &format!("Unable to write cache key \"{}\"", key))
        })?;
        match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified_time) => self.push(key, content, modified_time),
            Err(_) => {
                self.memory.pop(key);
            }
        }
        Ok(true)
    }

    pub fn has(&self, key: &str) -> Result<bool, Exception> {
        Ok(self.path_for(key)?.is_file())
    }

    // 删除；返回是否确实删除了文件
    pub fn delete(&mut self, key: &str) -> Result<bool, Exception> {
        let path = self.path_for(key)?;
        self.memory.pop(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("缓存键{}已删除", key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Exception::io(e, &format!("Unable to delete cache key \"{}\"", key))),
        }
    }

    // 放入内存
    fn push(&mut self, key: &str, content: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content,
            modified_time,
        };
        self.memory.put(key.to_string(), entry);
    }

    // 测试
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.memory.cap().get()
    }
}
