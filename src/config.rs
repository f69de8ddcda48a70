use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Name of the compressed snapshot inside the data directory
const DATA_FILE: &str = "qc.bin.gz";

/// Runtime configuration for the QC backend
///
/// Every field has a default and can be overridden through a `QC_*`
/// environment variable, see [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Directory holding the database snapshot
    pub data_dir: PathBuf,

    /// Directory for uploaded inspection images, served under `/storage`
    pub storage_dir: PathBuf,

    /// Lifetime of an access token in seconds
    pub access_token_secs: u64,

    /// Lifetime of a refresh token in seconds
    pub refresh_token_secs: u64,

    /// Super admins that can never be removed
    pub protected_super_admins: Vec<String>,

    /// Uploaded images wider than this are scaled down
    pub max_image_width: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5001".to_string(),
            data_dir: PathBuf::from("database"),
            storage_dir: PathBuf::from("storage"),
            access_token_secs: 60 * 60,
            refresh_token_secs: 30 * 24 * 60 * 60,
            protected_super_admins: vec!["YM6702".to_string(), "YM7903".to_string()],
            max_image_width: 1024,
        }
    }
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// Unset variables keep their default. Numeric variables that fail to
    /// parse are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(addr) = env::var("QC_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = env::var("QC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("QC_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        config.access_token_secs = parse_var("QC_ACCESS_TOKEN_SECS", config.access_token_secs);
        config.refresh_token_secs = parse_var("QC_REFRESH_TOKEN_SECS", config.refresh_token_secs);
        config.max_image_width = parse_var("QC_MAX_IMAGE_WIDTH", config.max_image_width);

        if let Ok(ids) = env::var("QC_PROTECTED_SUPER_ADMINS") {
            config.protected_super_admins = split_list(&ids);
        }

        config
    }

    /// Full path of the database snapshot
    pub fn data_file(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE)
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring invalid value {:?} for {}", raw, name);
                default
            }
        },
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
