use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("expected 'json' or 'pretty', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub public_base_url: String,
    pub company_name: String,
    pub job_code_prefix: String,
    pub job_code_digits: u32,
    pub code_allocation_attempts: u32,
    pub channel_timeout: Duration,
    pub channel_max_attempts: u32,
    pub linkedin_api_key: Option<String>,
    pub linkedin_company_id: Option<String>,
    pub indeed_api_key: Option<String>,
    pub log_format: LogFormat,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup: &lookup };

        let store_backend = vars.parse_or("JOB_STORE", StoreBackend::Postgres)?;
        let database_url = vars.optional("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(Error::Config(
                "DATABASE_URL is required when JOB_STORE=postgres".to_string(),
            ));
        }

        let job_code_digits: u32 = vars.parse_or("JOB_CODE_DIGITS", 6)?;
        if !(1..=9).contains(&job_code_digits) {
            return Err(Error::Config(format!(
                "Invalid value for JOB_CODE_DIGITS: {job_code_digits} (expected 1-9)"
            )));
        }

        let public_base_url = vars.required("PUBLIC_BASE_URL")?;
        url::Url::parse(&public_base_url)
            .map_err(|e| Error::Config(format!("Invalid value for PUBLIC_BASE_URL: {e}")))?;

        Ok(Self {
            server_address: vars.required("SERVER_ADDRESS")?,
            store_backend,
            database_url,
            public_base_url,
            company_name: vars
                .optional("COMPANY_NAME")
                .unwrap_or_else(|| "Our Company".to_string()),
            job_code_prefix: vars
                .optional("JOB_CODE_PREFIX")
                .unwrap_or_else(|| "JOB".to_string()),
            job_code_digits,
            code_allocation_attempts: vars.parse_or("CODE_ALLOCATION_ATTEMPTS", 8)?,
            channel_timeout: Duration::from_secs(vars.parse_or("CHANNEL_TIMEOUT_SECS", 10)?),
            channel_max_attempts: vars.parse_or("CHANNEL_MAX_ATTEMPTS", 1)?,
            linkedin_api_key: vars.optional("LINKEDIN_API_KEY"),
            linkedin_company_id: vars.optional("LINKEDIN_COMPANY_ID"),
            indeed_api_key: vars.optional("INDEED_API_KEY"),
            log_format: vars.parse_or("LOG_FORMAT", LogFormat::Json)?,
        })
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| Error::Config(format!("Missing environment variable: {}", name)))
    }

    fn parse_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
            None => Ok(default),
        }
    }
}

pub fn init_config() -> Result<&'static Config> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    get_config()
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
