use {super::*, std::path::Path};

pub const DEFAULT_POOL: &str = "auto.xatum.xelpool.com:5212";
pub const DEFAULT_XATUM_PORT: u16 = 5211;
pub const DEFAULT_GETWORK_PORT: u16 = 5210;
pub const DEFAULT_MINER_TIMEOUT: u64 = 60;
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 100;

const MIN_WALLET_LENGTH: usize = 10;

/// TOML config file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub wallet: Option<String>,
    pub pool: Option<String>,
    pub address: Option<IpAddr>,
    pub xatum_port: Option<u16>,
    pub getwork_port: Option<u16>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub miner_timeout: Option<u64>,
    pub max_connections_per_ip: Option<u32>,
    pub debug: Option<bool>,
}

/// Unified settings struct with all resolved configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub wallet: Option<String>,
    pub pool: Option<String>,
    pub address: Option<IpAddr>,
    pub xatum_port: Option<u16>,
    pub getwork_port: Option<u16>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub miner_timeout: Option<u64>,
    pub max_connections_per_ip: Option<u32>,
    pub debug: bool,
}

impl Settings {
    /// Load settings from all sources with proper priority
    pub fn load(options: Options) -> Result<Self> {
        let mut env = BTreeMap::<String, String>::new();

        for (var, value) in env::vars_os() {
            let Some(var) = var.to_str() else {
                continue;
            };

            let Some(key) = var.strip_prefix("XELPROXY_") else {
                continue;
            };

            env.insert(
                key.into(),
                value.into_string().map_err(|value| {
                    anyhow!(
                        "environment variable `{var}` not valid unicode: `{}`",
                        value.to_string_lossy()
                    )
                })?,
            );
        }

        Self::merge(options, env)
    }

    /// Merge all configuration sources
    pub fn merge(options: Options, env: BTreeMap<String, String>) -> Result<Self> {
        let settings = Self::from_options(&options).or(Self::from_env(&env)?);

        let config = match Self::find_config_path(&settings) {
            Some(config_path) => toml::from_str(
                &fs::read_to_string(&config_path).context(anyhow!(
                    "failed to open config file `{}`",
                    config_path.display()
                ))?,
            )
            .context(anyhow!(
                "failed to deserialize config file `{}`",
                config_path.display()
            ))?,
            None => Config::default(),
        };

        let settings = settings.or(Self::from_config(&config)).or_defaults();

        Self::validate(&settings)?;

        Ok(settings)
    }

    fn find_config_path(settings: &Self) -> Option<PathBuf> {
        if let Some(path) = &settings.config {
            return Some(path.clone());
        }

        if let Some(dir) = &settings.config_dir {
            let path = dir.join("xelproxy.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::config_dir()
            .map(|dir| dir.join("xelproxy").join("xelproxy.toml"))
            .filter(|path| path.exists())
    }

    pub fn from_options(options: &Options) -> Self {
        Self {
            config: options.config.clone(),
            config_dir: options.config_dir.clone(),
            wallet: options.wallet.clone(),
            pool: options.pool.clone(),
            address: options.address,
            xatum_port: options.xatum_port,
            getwork_port: options.getwork_port,
            cert: options.cert.clone(),
            key: options.key.clone(),
            miner_timeout: options.miner_timeout,
            max_connections_per_ip: options.max_connections_per_ip,
            debug: options.debug,
        }
    }

    pub fn from_env(env: &BTreeMap<String, String>) -> Result<Self> {
        let get_bool = |key: &str| {
            env.get(key)
                .map(|value| !value.is_empty() && value != "0" && value.to_lowercase() != "false")
                .unwrap_or_default()
        };

        let get_string = |key: &str| env.get(key).cloned();

        let get_path = |key: &str| env.get(key).map(PathBuf::from);

        fn get_parsed<T: FromStr>(env: &BTreeMap<String, String>, key: &str) -> Result<Option<T>>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            env.get(key)
                .map(|value| value.parse::<T>())
                .transpose()
                .with_context(|| {
                    format!(
                        "failed to parse environment variable XELPROXY_{key} as {}",
                        std::any::type_name::<T>()
                    )
                })
        }

        Ok(Self {
            config: get_path("CONFIG"),
            config_dir: get_path("CONFIG_DIR"),
            wallet: get_string("WALLET"),
            pool: get_string("POOL"),
            address: get_parsed(env, "ADDRESS")?,
            xatum_port: get_parsed(env, "XATUM_PORT")?,
            getwork_port: get_parsed(env, "GETWORK_PORT")?,
            cert: get_path("CERT"),
            key: get_path("KEY"),
            miner_timeout: get_parsed(env, "MINER_TIMEOUT")?,
            max_connections_per_ip: get_parsed(env, "MAX_CONNECTIONS_PER_IP")?,
            debug: get_bool("DEBUG"),
        })
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            config: None,
            config_dir: None,
            wallet: config.wallet.clone(),
            pool: config.pool.clone(),
            address: config.address,
            xatum_port: config.xatum_port,
            getwork_port: config.getwork_port,
            cert: config.cert.clone(),
            key: config.key.clone(),
            miner_timeout: config.miner_timeout,
            max_connections_per_ip: config.max_connections_per_ip,
            debug: config.debug.unwrap_or_default(),
        }
    }

    /// Merge self with another Settings, self takes priority
    pub fn or(self, other: Self) -> Self {
        Self {
            config: self.config.or(other.config),
            config_dir: self.config_dir.or(other.config_dir),
            wallet: self.wallet.or(other.wallet),
            pool: self.pool.or(other.pool),
            address: self.address.or(other.address),
            xatum_port: self.xatum_port.or(other.xatum_port),
            getwork_port: self.getwork_port.or(other.getwork_port),
            cert: self.cert.or(other.cert),
            key: self.key.or(other.key),
            miner_timeout: self.miner_timeout.or(other.miner_timeout),
            max_connections_per_ip: self.max_connections_per_ip.or(other.max_connections_per_ip),
            debug: self.debug || other.debug,
        }
    }

    fn or_defaults(self) -> Self {
        Self {
            config: self.config,
            config_dir: self.config_dir,
            wallet: self.wallet,
            pool: Some(self.pool.unwrap_or_else(|| DEFAULT_POOL.into())),
            address: Some(self.address.unwrap_or(IpAddr::from([0, 0, 0, 0]))),
            xatum_port: Some(self.xatum_port.unwrap_or(DEFAULT_XATUM_PORT)),
            getwork_port: Some(self.getwork_port.unwrap_or(DEFAULT_GETWORK_PORT)),
            cert: Some(self.cert.unwrap_or_else(|| "cert.pem".into())),
            key: Some(self.key.unwrap_or_else(|| "key.pem".into())),
            miner_timeout: Some(self.miner_timeout.unwrap_or(DEFAULT_MINER_TIMEOUT)),
            max_connections_per_ip: Some(
                self.max_connections_per_ip
                    .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
            ),
            debug: self.debug,
        }
    }

    fn validate(settings: &Self) -> Result {
        if let Some(wallet) = &settings.wallet {
            ensure!(
                wallet.len() > MIN_WALLET_LENGTH,
                "wallet address `{wallet}` is too short"
            );
        }

        if let Some(timeout) = settings.miner_timeout {
            ensure!(
                timeout > KEEPALIVE_MARGIN.as_secs(),
                "miner timeout must be greater than {} seconds, got {timeout}",
                KEEPALIVE_MARGIN.as_secs()
            );
        }

        Ok(())
    }

    pub fn wallet(&self) -> Result<&str> {
        self.wallet
            .as_deref()
            .filter(|wallet| !wallet.is_empty())
            .ok_or_else(|| anyhow!("no wallet address configured, use --wallet or XELPROXY_WALLET"))
    }

    pub fn pool(&self) -> &str {
        self.pool.as_deref().unwrap_or(DEFAULT_POOL)
    }

    pub fn address(&self) -> IpAddr {
        self.address.unwrap_or(IpAddr::from([0, 0, 0, 0]))
    }

    pub fn xatum_port(&self) -> u16 {
        self.xatum_port.unwrap_or(DEFAULT_XATUM_PORT)
    }

    pub fn getwork_port(&self) -> u16 {
        self.getwork_port.unwrap_or(DEFAULT_GETWORK_PORT)
    }

    pub fn cert(&self) -> &Path {
        self.cert.as_deref().unwrap_or(Path::new("cert.pem"))
    }

    pub fn key(&self) -> &Path {
        self.key.as_deref().unwrap_or(Path::new("key.pem"))
    }

    pub fn miner_timeout(&self) -> Duration {
        Duration::from_secs(self.miner_timeout.unwrap_or(DEFAULT_MINER_TIMEOUT))
    }

    pub fn max_connections_per_ip(&self) -> u32 {
        self.max_connections_per_ip
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP)
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}
