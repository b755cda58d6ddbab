use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{RowIndexRule, DEFAULT_INTER_ITEM_DELAY_MS};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "harvester.toml";

/// ASP.NET 网格中 IndexII 按钮的几种写法
pub const DEFAULT_ACTION_SELECTOR: &str =
    "input[value='IndexII'], input.Button[onclick*='indexII'], a[id*='btnIndex2']";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 列表页 URL（未找到目标页面时导航到这里）
    pub target_url: Option<String>,
    /// 列表页标题关键字，用于在已打开的标签页中定位源页面
    pub target_title: Option<String>,
    /// PDF 输出目录
    pub output_dir: PathBuf,
    /// 运行状态文件
    pub state_file: PathBuf,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 条目间隔（毫秒），控制器会强制下限
    pub inter_item_delay_ms: u64,
    /// 从触发元数据中提取行号的正则（必须包含一个捕获组）
    pub row_index_pattern: String,
    /// 列表页中"打开文档"按钮的选择器
    pub action_selector: String,
    /// 触发元数据中代表某一行的关键字模板，`{row}` 替换为行号
    pub row_key_template: String,
    pub timings: Timings,
}

/// 各类等待时长
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// 等待文档窗口出现（政府服务器很慢）
    pub surface_wait_ms: u64,
    /// 等待文档窗口加载完成
    pub load_wait_ms: u64,
    /// 加载完成后等待前端渲染
    pub render_settle_ms: u64,
    /// 找不到按钮时跳到下一条前的等待
    pub not_found_retry_ms: u64,
    /// 加载状态轮询间隔
    pub load_poll_ms: u64,
    /// 扫描重试间隔
    pub scan_retry_ms: u64,
    /// 扫描最大尝试次数
    pub scan_max_attempts: u32,
    /// 点击下一页前的等待
    pub nav_pre_click_ms: u64,
    /// 点击下一页后等待表格刷新
    pub nav_settle_ms: u64,
    /// 上下文重建后开始扫描前的等待
    pub resume_grace_ms: u64,
    /// 请求应答的超时
    pub request_ack_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            surface_wait_ms: 45_000,
            load_wait_ms: 30_000,
            render_settle_ms: 4_000,
            not_found_retry_ms: 2_000,
            load_poll_ms: 500,
            scan_retry_ms: 2_500,
            scan_max_attempts: 6,
            nav_pre_click_ms: 3_000,
            nav_settle_ms: 6_000,
            resume_grace_ms: 2_500,
            request_ack_ms: 5_000,
        }
    }
}

impl Timings {
    pub fn surface_wait(&self) -> Duration {
        Duration::from_millis(self.surface_wait_ms)
    }

    pub fn load_wait(&self) -> Duration {
        Duration::from_millis(self.load_wait_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    pub fn not_found_retry(&self) -> Duration {
        Duration::from_millis(self.not_found_retry_ms)
    }

    pub fn load_poll(&self) -> Duration {
        Duration::from_millis(self.load_poll_ms.max(1))
    }

    pub fn scan_retry(&self) -> Duration {
        Duration::from_millis(self.scan_retry_ms)
    }

    pub fn nav_pre_click(&self) -> Duration {
        Duration::from_millis(self.nav_pre_click_ms)
    }

    pub fn nav_settle(&self) -> Duration {
        Duration::from_millis(self.nav_settle_ms)
    }

    pub fn resume_grace(&self) -> Duration {
        Duration::from_millis(self.resume_grace_ms)
    }

    pub fn request_ack(&self) -> Duration {
        Duration::from_millis(self.request_ack_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: None,
            target_title: None,
            output_dir: PathBuf::from("IGR_PDFs"),
            state_file: PathBuf::from("harvester_state.json"),
            output_log_file: "harvester.log".to_string(),
            verbose_logging: false,
            inter_item_delay_ms: DEFAULT_INTER_ITEM_DELAY_MS,
            row_index_pattern: RowIndexRule::DEFAULT_PATTERN.to_string(),
            action_selector: DEFAULT_ACTION_SELECTOR.to_string(),
            row_key_template: "indexII${row}".to_string(),
            timings: Timings::default(),
        }
    }
}

/// TOML 配置文件的结构，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    browser_debug_port: Option<u16>,
    target_url: Option<String>,
    target_title: Option<String>,
    output_dir: Option<PathBuf>,
    state_file: Option<PathBuf>,
    output_log_file: Option<String>,
    verbose_logging: Option<bool>,
    inter_item_delay_ms: Option<u64>,
    row_index_pattern: Option<String>,
    action_selector: Option<String>,
    row_key_template: Option<String>,
    timings: Option<Timings>,
}

impl Config {
    /// 加载配置：默认值 → TOML 文件 → 环境变量
    pub fn load() -> Result<Self> {
        let path = std::env::var("HARVESTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let base = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        Ok(base.with_env())
    }

    /// 从 TOML 文件加载，缺失字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let default = Self::default();
        Ok(Self {
            browser_debug_port: file.browser_debug_port.unwrap_or(default.browser_debug_port),
            target_url: file.target_url.or(default.target_url),
            target_title: file.target_title.or(default.target_title),
            output_dir: file.output_dir.unwrap_or(default.output_dir),
            state_file: file.state_file.unwrap_or(default.state_file),
            output_log_file: file.output_log_file.unwrap_or(default.output_log_file),
            verbose_logging: file.verbose_logging.unwrap_or(default.verbose_logging),
            inter_item_delay_ms: file.inter_item_delay_ms.unwrap_or(default.inter_item_delay_ms),
            row_index_pattern: file.row_index_pattern.unwrap_or(default.row_index_pattern),
            action_selector: file.action_selector.unwrap_or(default.action_selector),
            row_key_template: file.row_key_template.unwrap_or(default.row_key_template),
            timings: file.timings.unwrap_or(default.timings),
        })
    }

    /// 检查配置值之间的约束
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.row_key_template.contains("{row}") {
            return Err(ConfigError::InvalidValue {
                field: "row_key_template".to_string(),
                reason: "必须包含 {row} 占位符".to_string(),
            });
        }
        if let Err(e) = RowIndexRule::new(&self.row_index_pattern) {
            return Err(ConfigError::InvalidValue {
                field: "row_index_pattern".to_string(),
                reason: e.to_string(),
            });
        }
        if self.action_selector.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "action_selector".to_string(),
                reason: "不能为空".to_string(),
            });
        }
        Ok(())
    }

    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env(self) -> Self {
        Self {
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(self.browser_debug_port),
            target_url: std::env::var("TARGET_URL").ok().or(self.target_url),
            target_title: std::env::var("TARGET_TITLE").ok().or(self.target_title),
            output_dir: std::env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(self.output_dir),
            state_file: std::env::var("STATE_FILE").map(PathBuf::from).unwrap_or(self.state_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            inter_item_delay_ms: env_parse("INTER_ITEM_DELAY_MS").unwrap_or(self.inter_item_delay_ms),
            row_index_pattern: std::env::var("ROW_INDEX_PATTERN").unwrap_or(self.row_index_pattern),
            action_selector: std::env::var("ACTION_SELECTOR").unwrap_or(self.action_selector),
            row_key_template: std::env::var("ROW_KEY_TEMPLATE").unwrap_or(self.row_key_template),
            timings: self.timings,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
