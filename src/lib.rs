pub mod cache;
pub mod config;
pub mod encoder;
pub mod exception;
pub mod header;
pub mod message;
pub mod param;
pub mod request;
pub mod stream;
pub mod upload;
pub mod uri;
pub mod util;

pub use cache::FileCache;
pub use config::Config;
pub use encoder::{encode, Component};
pub use exception::{Exception, ExceptionKind};
pub use header::Headers;
pub use message::{Message, MessageHead};
pub use param::UploadErrorCode;
pub use request::{BodyInit, Params, RequestInit, ServerRequest, UriInit};
pub use stream::{Resource, SharedStream, Stream, StreamMetadata};
pub use upload::{UploadSource, UploadedFile, UploadedFileNode, UploadedFiles};
pub use uri::Uri;
