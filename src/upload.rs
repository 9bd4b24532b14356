// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 上传文件模块
//!
//! `UploadedFile` 描述一次上传得到的单个文件：大小、状态码、客户端给出的文件名与媒体类型，
//! 以及文件内容的来源（临时文件路径或流）。内容可以通过 [`UploadedFile::stream`] 读取，
//! 也可以通过 [`UploadedFile::move_to`] 移动到最终位置，且只能移动一次。
//!
//! 上传文件在请求中组织成一棵树：叶子是文件，分支是以字段名为键的嵌套映射。

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};
use serde_json::Value;

use crate::{
    exception::Exception,
    param::{UploadErrorCode, UPLOAD_CHUNK_SIZE},
    stream::{SharedStream, Stream},
    util::format_file_size,
};

/// 上传文件内容的来源
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// 服务器保存的临时文件
    Path(PathBuf),
    Stream(SharedStream),
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::Path(path)
    }
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        UploadSource::Path(path.to_path_buf())
    }
}

impl From<Stream> for UploadSource {
    fn from(stream: Stream) -> Self {
        UploadSource::Stream(stream.into())
    }
}

impl From<SharedStream> for UploadSource {
    fn from(stream: SharedStream) -> Self {
        UploadSource::Stream(stream)
    }
}

#[derive(Debug)]
struct UploadState {
    /// 状态码不是 `Ok` 时为 `None`
    source: Option<UploadSource>,
    /// 由路径打开的流，第一次访问时创建
    opened: Option<SharedStream>,
    moved: bool,
}

/// 一个上传文件
#[derive(Debug)]
pub struct UploadedFile {
    size: Option<u64>,
    error: UploadErrorCode,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    state: Mutex<UploadState>,
}

impl UploadedFile {
    /// 构造上传文件。`error` 必须是 `UPLOAD_ERR_*` 中的一个；状态码不是 0 时忽略 `source`。
    pub fn new(
        source: impl Into<UploadSource>,
        size: Option<u64>,
        error: i64,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Result<Self, Exception> {
        let error = UploadErrorCode::from_code(error)?;
        let source = if error.is_ok() {
            Some(source.into())
        } else {
            None
        };
        Ok(Self {
            size,
            error,
            client_filename,
            client_media_type,
            state: Mutex::new(UploadState {
                source,
                opened: None,
                moved: false,
            }),
        })
    }

    /// 上传失败时的描述对象；没有可用内容
    pub fn failed(error: i64, client_filename: Option<String>) -> Result<Self, Exception> {
        let code = UploadErrorCode::from_code(error)?;
        if code.is_ok() {
            return Err(Exception::InvalidUploadStatus(error));
        }
        Self::new(PathBuf::new(), None, error, client_filename, None)
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    /// 客户端提供的文件名，不可信
    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    /// 客户端提供的媒体类型，不可信
    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    pub fn is_moved(&self) -> bool {
        self.lock().moved
    }

    fn lock(&self) -> MutexGuard<'_, UploadState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("上传文件状态锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn ensure_available(&self, state: &UploadState) -> Result<(), Exception> {
        if !self.error.is_ok() {
            return Err(Exception::UploadFailed(self.error.description()));
        }
        if state.moved {
            return Err(Exception::UploadAlreadyMoved);
        }
        Ok(())
    }

    /// 文件内容对应的流；由路径构造的上传文件在第一次调用时以只读方式打开。
    pub fn stream(&self) -> Result<SharedStream, Exception> {
        let mut state = self.lock();
        self.ensure_available(&state)?;

        if let Some(opened) = &state.opened {
            return Ok(opened.clone());
        }
        let stream = match &state.source {
            Some(UploadSource::Stream(stream)) => stream.clone(),
            Some(UploadSource::Path(path)) => SharedStream::new(Stream::open(path, "rb")?),
            None => return Err(Exception::UploadFailed(self.error.description())),
        };
        state.opened = Some(stream.clone());
        Ok(stream)
    }

    /// 把上传文件移动到 `target_path`。成功后流和再次移动都不可用。
    pub fn move_to(&self, target_path: impl AsRef<Path>) -> Result<(), Exception> {
        let target_path = target_path.as_ref();
        let mut state = self.lock();
        self.ensure_available(&state)?;

        if target_path.as_os_str().is_empty() {
            return Err(Exception::EmptyTargetPath);
        }

        let directory = match target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !is_writable_dir(directory) {
            return Err(Exception::TargetDirectoryUnavailable(
                directory.display().to_string(),
            ));
        }

        match &state.source {
            Some(UploadSource::Path(path)) => move_file(path, target_path)?,
            Some(UploadSource::Stream(stream)) => copy_stream(stream, target_path)?,
            None => return Err(Exception::UploadFailed(self.error.description())),
        }

        debug!(
            "上传文件{}已移动到{}，大小{}",
            self.client_filename().unwrap_or("<unnamed>"),
            target_path.display(),
            format_file_size(self.size.unwrap_or(0))
        );
        state.opened = None;
        state.moved = true;
        Ok(())
    }
}

fn is_writable_dir(directory: &Path) -> bool {
    match fs::metadata(directory) {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}

/// 先尝试重命名；跨文件系统时退化为复制后删除
fn move_file(from: &Path, to: &Path) -> Result<(), Exception> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let context = format!("Uploaded file could not be moved to \"{}\"", to.display());
    fs::copy(from, to).map_err(|e| Exception::io(e, &context))?;
    fs::remove_file(from).map_err(|e| Exception::io(e, &context))?;
    Ok(())
}

fn copy_stream(stream: &SharedStream, to: &Path) -> Result<(), Exception> {
    let mut stream = stream.lock();
    stream.rewind()?;
    if !stream.is_readable() {
        return Err(Exception::StreamNotReadable);
    }

    let context = format!("Unable to write to \"{}\"", to.display());
    let mut file = File::create(to).map_err(|e| Exception::io(e, &context))?;
    let copied = (|| -> Result<(), Exception> {
        while !stream.eof() {
            let chunk = stream.read(UPLOAD_CHUNK_SIZE)?;
            if chunk.is_empty() {
                break;
            }
            file.write_all(&chunk)
                .map_err(|e| Exception::io(e, &context))?;
        }
        Ok(())
    })();
    if copied.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(to) {
            warn!("无法清理未完成的目标文件{}：{}", to.display(), e);
        }
    }
    copied
}

/// 带有标量 `tmp_name` 或 `error` 的对象才是文件描述；
/// 值为对象或数组时说明这是一个同名的嵌套表单字段
fn is_leaf_descriptor(map: &serde_json::Map<String, Value>) -> bool {
    let scalar = |key: &str| match map.get(key) {
        None => None,
        Some(Value::Object(_)) | Some(Value::Array(_)) => Some(false),
        Some(_) => Some(true),
    };
    match (scalar("tmp_name"), scalar("error")) {
        (None, None) => false,
        (tmp_name, error) => tmp_name.unwrap_or(true) && error.unwrap_or(true),
    }
}

/// 上传文件树的节点
#[derive(Debug, Clone)]
pub enum UploadedFileNode {
    File(Arc<UploadedFile>),
    Branch(UploadedFiles),
}

/// 以表单字段名为键的上传文件树
pub type UploadedFiles = BTreeMap<String, UploadedFileNode>;

impl From<UploadedFile> for UploadedFileNode {
    fn from(file: UploadedFile) -> Self {
        UploadedFileNode::File(Arc::new(file))
    }
}

impl From<UploadedFiles> for UploadedFileNode {
    fn from(branch: UploadedFiles) -> Self {
        UploadedFileNode::Branch(branch)
    }
}

impl UploadedFileNode {
    pub fn as_file(&self) -> Option<&Arc<UploadedFile>> {
        match self {
            UploadedFileNode::File(file) => Some(file),
            UploadedFileNode::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&UploadedFiles> {
        match self {
            UploadedFileNode::File(_) => None,
            UploadedFileNode::Branch(branch) => Some(branch),
        }
    }

    /// 从形如 `$_FILES` 的 JSON 描述构造上传文件树。
    ///
    /// 叶子是带有 `tmp_name` 或 `error` 键的对象（可选 `size`、`name`、`type`），
    /// 分支是对象或数组。其余任何值都会以 `InvalidUploadedFile` 失败，并报告其所在路径。
    pub fn tree_from_descriptor(descriptor: &Value) -> Result<UploadedFiles, Exception> {
        match descriptor {
            Value::Object(map) => {
                let mut files = UploadedFiles::new();
                for (key, value) in map {
                    files.insert(key.clone(), Self::from_descriptor(value, key)?);
                }
                Ok(files)
            }
            _ => Err(Exception::InvalidUploadedFile(String::new())),
        }
    }

    fn from_descriptor(value: &Value, path: &str) -> Result<Self, Exception> {
        match value {
            Value::Object(map) if is_leaf_descriptor(map) => {
                Self::leaf_from_descriptor(map, path)
            }
            Value::Object(map) => {
                let mut branch = UploadedFiles::new();
                for (key, child) in map {
                    let child_path = format!("{}[{}]", path, key);
                    branch.insert(key.clone(), Self::from_descriptor(child, &child_path)?);
                }
                Ok(UploadedFileNode::Branch(branch))
            }
            Value::Array(items) => {
                let mut branch = UploadedFiles::new();
                for (index, child) in items.iter().enumerate() {
                    let child_path = format!("{}[{}]", path, index);
                    branch.insert(index.to_string(), Self::from_descriptor(child, &child_path)?);
                }
                Ok(UploadedFileNode::Branch(branch))
            }
            _ => Err(Exception::InvalidUploadedFile(path.to_string())),
        }
    }

    fn leaf_from_descriptor(
        map: &serde_json::Map<String, Value>,
        path: &str,
    ) -> Result<Self, Exception> {
        let invalid = || Exception::InvalidUploadedFile(path.to_string());
        let optional_str = |key: &str| -> Result<Option<String>, Exception> {
            match map.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(invalid()),
            }
        };

        let error = match map.get("error") {
            None => 0,
            Some(value) => value.as_i64().ok_or_else(invalid)?,
        };
        let size = match map.get("size") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().ok_or_else(invalid)?),
        };
        let tmp_name = optional_str("tmp_name")?;
        if error == 0 && tmp_name.as_deref().map_or(true, str::is_empty) {
            return Err(invalid());
        }

        let file = UploadedFile::new(
            PathBuf::from(tmp_name.unwrap_or_default()),
            size,
            error,
            optional_str("name")?,
            optional_str("type")?,
        )?;
        Ok(file.into())
    }
}
