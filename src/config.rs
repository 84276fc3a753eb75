use std::convert::TryFrom;
use std::path::{ Path, PathBuf };

use log::LevelFilter;
use yaml_rust::{ Yaml, YamlLoader };

use crate::error::{ Error, Result };

pub const CONFIG_ENV: &str = "LAPTRACE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "laptrace.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub default_year: i32,
    pub log_level: LevelFilter,
    pub window: WindowSpec,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            data_dir: PathBuf::from("media/sessions"),
            default_year: 2024,
            log_level: LevelFilter::Info,
            window: WindowSpec {
                title: "laptrace".to_string(),
                width: 1200.0,
                height: 800.0,
            },
        }
    }
}

impl Config {
    /// Reads the file named by `LAPTRACE_CONFIG`, or `laptrace.yaml` in the
    /// working directory. A missing file yields the defaults.
    pub fn load_default() -> Result<Config> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Config::load(&path)
    }

    pub fn load(path: &Path) -> Result<Config> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Config::try_from(contents.as_str()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(source) => Err(Error::Io { path: path.display().to_string(), source }),
        }
    }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    level.parse::<LevelFilter>()
        .map_err(|_| Error::schema("config", format!["unknown log level {}", level]))
}

fn as_f32(value: &Yaml, key: &str) -> Result<Option<f32>> {
    match value {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(i) => Ok(Some(*i as f32)),
        Yaml::Real(_) => value.as_f64()
            .map(|f| Some(f as f32))
            .ok_or_else(|| Error::schema("config", format!["{} is not a number", key])),
        _ => Err(Error::schema("config", format!["{} is not a number", key])),
    }
}

impl TryFrom<&str> for Config {
    type Error = Error;

    fn try_from(str: &str) -> Result<Config> {
        let mut config = Config::default();

        let docs = YamlLoader::load_from_str(str)?;
        let parsed = match docs.first() {
            Some(doc) => doc,
            None => return Ok(config),
        };

        match &parsed["data_dir"] {
            Yaml::String(dir) => config.data_dir = PathBuf::from(dir),
            Yaml::BadValue | Yaml::Null => (),
            _ => return Err(Error::schema("config", "data_dir must be a string")),
        }

        match &parsed["default_year"] {
            Yaml::Integer(year) => config.default_year = *year as i32,
            Yaml::BadValue | Yaml::Null => (),
            _ => return Err(Error::schema("config", "default_year must be an integer")),
        }

        match &parsed["log_level"] {
            Yaml::String(level) => config.log_level = parse_level(level)?,
            Yaml::BadValue | Yaml::Null => (),
            _ => return Err(Error::schema("config", "log_level must be a string")),
        }

        let window = &parsed["window"];
        if let Yaml::String(title) = &window["title"] {
            config.window.title = title.clone();
        }
        if let Some(width) = as_f32(&window["width"], "window.width")? {
            config.window.width = width;
        }
        if let Some(height) = as_f32(&window["height"], "window.height")? {
            config.window.height = height;
        }

        Ok(config)
    }
}
