use std::fmt;
use std::time::Duration;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 连接浏览器失败
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 找不到源页面
    SourcePageNotFound { hint: String },
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 打印 PDF 失败
    PrintFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::ConnectionFailed { port, source } => {
                write!(f, "无法连接到浏览器 (端口: {}): {}", port, source)
            }
            BrowserError::SourcePageNotFound { hint } => {
                write!(f, "找不到源页面: {}", hint)
            }
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
            BrowserError::PrintFailed { source } => {
                write!(f, "打印 PDF 失败: {}", source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::ConnectionFailed { source, .. }
            | BrowserError::ScriptExecutionFailed { source }
            | BrowserError::PrintFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            BrowserError::SourcePageNotFound { .. } => None,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 解析文件失败（JSON / TOML）
    ParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 输出目录不可用
    OutputDir { path: String, reason: String },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::ParseFailed { path, source } => {
                write!(f, "解析文件失败 ({}): {}", path, source)
            }
            FileError::OutputDir { path, reason } => {
                write!(f, "输出目录不可用 ({}): {}", path, reason)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::ParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            FileError::OutputDir { .. } => None,
        }
    }
}

/// 单个条目的抓取错误
///
/// 除 `SourceGone` 外都只跳过当前条目，队列继续前进
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// 找不到触发按钮
    TargetNotFound { row: u32 },
    /// 等待新窗口超时
    SurfaceTimeout { waited: Duration },
    /// 新窗口加载超时
    LoadTimeout { waited: Duration },
    /// 打印结果为空
    CaptureEmpty,
    /// 源页面已关闭或跳走，整个运行终止
    SourceGone,
    /// 页面结构无法识别
    AdapterMismatch { detail: String },
    /// 其他意外错误
    Unexpected { detail: String },
}

impl CaptureError {
    /// 是否终止整个运行
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, CaptureError::SourceGone)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::TargetNotFound { row } => write!(f, "第 {} 行按钮不存在", row),
            CaptureError::SurfaceTimeout { waited } => {
                write!(f, "{} 秒内未出现文档窗口", waited.as_secs())
            }
            CaptureError::LoadTimeout { waited } => {
                write!(f, "文档窗口 {} 秒内未加载完成", waited.as_secs())
            }
            CaptureError::CaptureEmpty => write!(f, "打印结果为空"),
            CaptureError::SourceGone => write!(f, "源页面已关闭"),
            CaptureError::AdapterMismatch { detail } => write!(f, "页面结构无法识别: {}", detail),
            CaptureError::Unexpected { detail } => write!(f, "意外错误: {}", detail),
        }
    }
}

impl std::error::Error for CaptureError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置值非法
    InvalidValue { field: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "配置项 {} 非法: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件解析错误
    pub fn file_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_gone_is_fatal() {
        assert!(CaptureError::SourceGone.is_run_fatal());
        assert!(!CaptureError::TargetNotFound { row: 1 }.is_run_fatal());
        assert!(!CaptureError::SurfaceTimeout {
            waited: Duration::from_secs(45)
        }
        .is_run_fatal());
        assert!(!CaptureError::CaptureEmpty.is_run_fatal());
    }

    #[test]
    fn test_display_mentions_wait_seconds() {
        let err = CaptureError::SurfaceTimeout {
            waited: Duration::from_secs(45),
        };
        assert!(err.to_string().contains("45"));
    }
}
