#[cfg(test)]
#[path = "utils_test.rs"]
mod tests;

use chrono::Local;
use eyre::{Context, Result};
use log::LevelFilter;
use regex::Regex;
use std::{io::Write, str::FromStr};

use super::{APP_NAME, Configuration, LogConfig};

pub fn load_configuration(config_path: &str) -> Result<Configuration> {
    let config =
        std::fs::read_to_string(config_path).wrap_err(format!("reading {}", config_path))?;
    let config: Configuration = toml::from_str(&config).wrap_err("parsing configuration")?;
    Ok(config)
}

pub fn init_logger(config: &LogConfig) -> Result<()> {
    let target: Box<dyn std::io::Write + Send + 'static> = match config.file.as_ref() {
        Some(file) => {
            let path = resolve_path(&file.path)
                .wrap_err(format!("resolving log file path {}", file.path))?;
            init_parent_dir(&path)?;
            Box::new(
                std::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(file.append)
                    .truncate(!file.append)
                    .open(&path)
                    .wrap_err(format!("opening log file {}", path))?,
            )
        }
        None => Box::new(std::io::stderr()),
    };

    let raw_level = config.level.as_deref().unwrap_or("info");
    let log_level = LevelFilter::from_str(raw_level)
        .wrap_err(format!("parsing log level {}", raw_level))?;

    let mut builder = env_logger::Builder::new();

    for filter in config.filters.as_deref().unwrap_or_default() {
        let module_level = LevelFilter::from_str(filter.level.as_deref().unwrap_or(raw_level))
            .unwrap_or(log_level);
        builder.filter(filter.module.as_deref(), module_level);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}/{}:{} {} [{}] - {}",
                record.module_path().unwrap_or("unknown"),
                basename(record.file().unwrap_or("unknown")),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(target))
        .filter(None, log_level)
        .try_init()?;
    Ok(())
}

pub fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// resolve_path expands `$VAR` and `${VAR}` references in the input path
/// and returns it as an absolute path. Unset variables expand to an empty
/// string.
pub fn resolve_path(path: &str) -> Result<String> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").wrap_err("compiling regex")?;

    let expanded = re.replace_all(path, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    });

    let path = std::path::absolute(expanded.as_ref())
        .wrap_err(format!("resolving path {}", expanded))?;
    Ok(path.to_string_lossy().to_string())
}

/// lookup_config_path looks up the config file at:
/// * $XDG_CONFIG_HOME/ragchat/config.toml
/// * $HOME/.config/ragchat/config.toml
/// * $HOME/.ragchat.toml
pub fn lookup_config_path() -> Option<String> {
    let mut paths = vec![];
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(format!("{}/{}/config.toml", xdg, APP_NAME));
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    paths.push(format!("{}/.config/{}/config.toml", home, APP_NAME));
    paths.push(format!("{}/.{}.toml", home, APP_NAME));

    paths
        .into_iter()
        .find(|path| std::path::Path::new(path).exists())
}

pub(crate) fn init_parent_dir(path: &str) -> Result<()> {
    let dir = std::path::Path::new(path)
        .parent()
        .unwrap_or(std::path::Path::new("."));
    std::fs::create_dir_all(dir).wrap_err(format!("creating directory {}", dir.display()))?;
    Ok(())
}
