// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::num::NonZeroUsize;

use crate::exception::Exception;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_cache_dir")]
    cache_dir: String,
    #[serde(default = "default_cache_capacity")]
    cache_capacity: usize,
    #[serde(default = "default_log_config")]
    log_config: String,
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_cache_capacity() -> usize {
    64
}

fn default_log_config() -> String {
    "config/log4rs.yaml".to_string()
}

impl Config {
    pub fn new() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_capacity: default_cache_capacity(),
            log_config: default_log_config(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::io(e, &format!("Unable to open config file \"{}\"", filename)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::io(e, &format!("Error reading config file \"{}\"", filename)))?;

        let mut raw_config = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.cache_capacity == 0 {
            warn!(
                "cache_capacity被设置为0，但内存缓存不能为空，因此该值将被改为{}。",
                default_cache_capacity()
            );
            raw_config.cache_capacity = default_cache_capacity();
        }
        Ok(raw_config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn cache_dir(&self) -> &str {
        &self.cache_dir
    }

    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn log_config(&self) -> &str {
        &self.log_config
    }
}
