use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use fieldx::fxstruct;
use garde::Validate;

/// Service configuration. Every option can also be set with a `BANNERS_*` environment variable.
#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, name = "banner-service")]
pub struct Config {
    /// How long, in seconds, a banner stays in the user-facing cache.
    #[clap(long, env = "BANNERS_CACHE_TTL", default_value_t = 300)]
    #[garde(range(min = 1))]
    cache_ttl_secs: u64,

    /// Seconds between two sweeps of expired cache entries.
    #[clap(long, env = "BANNERS_EVICTION_INTERVAL", default_value_t = 60)]
    #[garde(range(min = 1))]
    eviction_interval_secs: u64,

    /// Upper bound, in seconds, for a single store operation.
    #[clap(long, env = "BANNERS_STORE_TIMEOUT", default_value_t = 5)]
    #[garde(range(min = 1))]
    store_timeout_secs: u64,

    /// Maximum number of cached entries, 0 for no limit. A bounded cache may refuse to keep freshly read content.
    #[clap(long, env = "BANNERS_CACHE_CAPACITY", default_value_t = 0)]
    #[garde(skip)]
    cache_capacity: u64,

    /// SQLite database file. Created if missing.
    #[clap(long, env = "BANNERS_SQLITE_PATH", default_value = "banners.db")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    sqlite_path: PathBuf,

    /// Use PostgreSQL instead of SQLite.
    #[clap(long, env = "BANNERS_PG", default_value_t = false)]
    #[garde(custom(Self::backend_available))]
    pg: bool,

    #[clap(long, env = "BANNERS_PG_HOST", default_value = "localhost")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_host: String,

    #[clap(long, env = "BANNERS_PG_PORT", default_value_t = 5432)]
    #[garde(skip)]
    pg_port: u16,

    #[clap(long, env = "BANNERS_PG_USER", default_value = "banners")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_user: String,

    #[clap(long, env = "BANNERS_PG_PASSWORD", hide_env_values = true, default_value = "banners")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_password: String,

    #[clap(long, env = "BANNERS_PG_DATABASE", default_value = "banners")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    pg_database: String,

    /// File to send log into. Standard output is used if not set.
    #[clap(long, env = "BANNERS_LOG_FILE")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    log_file: Option<PathBuf>,
}

impl Config {
    /// Parse and validate the process command line.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::from_args(std::env::args_os())
    }

    /// Parse and validate the given arguments. The first one is the program name.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        if let Err(err) = config.validate() {
            return Err(Self::command().error(ErrorKind::InvalidValue, err));
        }
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Connection URL of the PostgreSQL database.
    pub fn pg_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.pg_user, self.pg_password, self.pg_host, self.pg_port, self.pg_database
        )
    }

    fn backend_available(pg: &bool, _: &()) -> garde::Result {
        if *pg && !cfg!(feature = "pg") {
            Err(garde::Error::new("build feature 'pg' must be enabled to use --pg"))
        }
        else if !*pg && !cfg!(feature = "sqlite") {
            Err(garde::Error::new("build feature 'sqlite' must be enabled unless --pg is given"))
        }
        else {
            Ok(())
        }
    }
}
