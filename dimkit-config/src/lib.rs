use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DIMKIT_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub dimension: DimensionConfig,
    #[serde(default)]
    pub breaking: BreakingConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `DIMKIT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 曲线序列与拼接使用的几何容差。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default = "ToleranceConfig::default_value")]
    pub equal_point: f64,
    #[serde(default = "ToleranceConfig::default_value")]
    pub equal_vector: f64,
}

impl ToleranceConfig {
    fn default_value() -> f64 {
        1e-10
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            equal_point: Self::default_value(),
            equal_vector: Self::default_value(),
        }
    }
}

/// 默认标注样式。枚举类参数沿用系统变量的整数编码（DIMATFIT、DIMJUST、DIMTAD、DIMTMOVE）。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DimensionConfig {
    pub arrow_size: f64,
    pub gap: f64,
    pub text_height: f64,
    pub ext_line_offset: f64,
    pub ext_line_extension: f64,
    pub dim_line_extension: f64,
    pub fit: i16,
    pub justification: i16,
    pub vertical: i16,
    pub text_move: i16,
    pub text_inside_horizontal: bool,
    pub text_outside_horizontal: bool,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            arrow_size: 0.18,
            gap: 0.09,
            text_height: 0.18,
            ext_line_offset: 0.0625,
            ext_line_extension: 0.18,
            dim_line_extension: 0.0,
            fit: 3,
            justification: 0,
            vertical: 0,
            text_move: 0,
            text_inside_horizontal: true,
            text_outside_horizontal: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BreakingConfig {
    /// 单点打断留出的间隙长度。
    #[serde(default = "BreakingConfig::default_break_size")]
    pub break_size: f64,
}

impl BreakingConfig {
    fn default_break_size() -> f64 {
        0.125
    }
}

impl Default for BreakingConfig {
    fn default() -> Self {
        Self {
            break_size: Self::default_break_size(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.tolerance.equal_point, 1e-10);
        assert_eq!(cfg.dimension.fit, 3);
        assert!(cfg.dimension.text_inside_horizontal);
        assert_eq!(cfg.breaking.break_size, 0.125);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [tolerance]
            equal_point = 1e-8

            [dimension]
            arrow_size = 2.5
            justification = 1
            vertical = 1
            text_inside_horizontal = false

            [breaking]
            break_size = 3.0
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.tolerance.equal_point, 1e-8);
        assert_eq!(cfg.tolerance.equal_vector, 1e-10);
        assert_eq!(cfg.dimension.arrow_size, 2.5);
        assert_eq!(cfg.dimension.justification, 1);
        assert_eq!(cfg.dimension.vertical, 1);
        assert!(!cfg.dimension.text_inside_horizontal);
        assert_eq!(cfg.dimension.gap, 0.09, "未给出的字段应取默认值");
        assert_eq!(cfg.breaking.break_size, 3.0);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[breaking]\nbreak_size = \"wide\"").unwrap();
        match AppConfig::from_file(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            AppConfig::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
