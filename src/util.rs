// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::info;

use crate::exception::Exception;

/// 从 YAML 文件初始化 log4rs 日志后端
pub fn init_logger(path: &str) -> Result<(), Exception> {
    log4rs::init_file(path, Default::default())
        .map_err(|e| Exception::LoggerInit(format!("{}: {}", path, e)))?;
    info!("日志配置{}已载入", path);
    Ok(())
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size() {
        let a = 9926;
        let b = 51800;
        assert_eq!(format_file_size(a), "9.7 KB".to_string());
        assert_eq!(format_file_size(b), "50.6 KB".to_string());
    }

    #[test]
    fn test_file_size_units() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5242880), "5.0 MB");
        assert_eq!(format_file_size(3221225472), "3.0 GB");
        assert_eq!(format_file_size(1099511627776), "1.0 TB");
    }

    #[test]
    fn test_init_logger_missing_file() {
        let err = init_logger("config/does-not-exist.yaml").unwrap_err();
        assert!(err.is_runtime_io());
        assert!(err.to_string().contains("does-not-exist.yaml"));
    }
}
