use std::path::PathBuf;
use std::process::ExitCode;

use dimkit_config::{AppConfig, ConfigError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod demo;

#[derive(Debug, Default, PartialEq)]
struct Options {
    json: bool,
    config: Option<PathBuf>,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--config" => {
                let path = args.next().ok_or("`--config` 缺少配置文件路径")?;
                options.config = Some(PathBuf::from(path));
            }
            other => return Err(format!("无法识别的参数：{other}")),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    let options = match parse_options(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let config = resolve_config(options.config);
    init_logging(&config.logging.level);
    info!(json = options.json, "运行 dimkit 演示场景");

    let report = match demo::run(&config) {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "演示场景计算失败");
            return ExitCode::FAILURE;
        }
    };

    if !options.json {
        demo::print_report(&report);
        return ExitCode::SUCCESS;
    }
    match serde_json::to_string_pretty(&report) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "演示结果无法序列化为 JSON");
            ExitCode::FAILURE
        }
    }
}

/// 显式路径优先，其次自动发现；任何失败都退回内建默认值。
fn resolve_config(explicit: Option<PathBuf>) -> AppConfig {
    let loaded = match &explicit {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    };
    loaded.unwrap_or_else(|err| {
        match &err {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                warn!(path = %path.display(), error = %err, "配置不可用，改用内建默认值");
            }
            ConfigError::Context { .. } => warn!(error = %err, "配置不可用，改用内建默认值"),
        }
        AppConfig::default()
    })
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = fmt().with_env_filter(filter).try_init() {
        debug!(error = %err, "日志订阅者已存在，沿用现有配置");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_json_and_config_flags() {
        let options = parse_options(args(&["--json", "--config", "dim.toml"])).expect("参数合法");
        assert_eq!(
            options,
            Options {
                json: true,
                config: Some(PathBuf::from("dim.toml")),
            }
        );
    }

    #[test]
    fn rejects_missing_path_and_unknown_flags() {
        assert!(parse_options(args(&["--config"])).is_err());
        assert!(parse_options(args(&["--bevy"])).is_err());
    }

    #[test]
    fn repeated_logging_init_is_tolerated() {
        init_logging("info");
        init_logging("not a valid filter [");
    }
}
