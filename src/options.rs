use super::*;

#[derive(Clone, Default, Debug, Parser)]
pub struct Options {
    #[arg(long, help = "Load configuration from <CONFIG>.")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Load configuration from <CONFIG_DIR>/xelproxy.toml.")]
    pub config_dir: Option<PathBuf>,

    #[arg(long, help = "Mine to <WALLET>.")]
    pub wallet: Option<String>,

    #[arg(long, help = "Connect to pool at <POOL>. [default: auto.xatum.xelpool.com:5212]")]
    pub pool: Option<String>,

    #[arg(long, help = "Listen on <ADDRESS>. [default: 0.0.0.0]")]
    pub address: Option<IpAddr>,

    #[arg(long, help = "Accept Xatum miners on <XATUM_PORT>. [default: 5211]")]
    pub xatum_port: Option<u16>,

    #[arg(long, help = "Accept getwork miners on <GETWORK_PORT>. [default: 5210]")]
    pub getwork_port: Option<u16>,

    #[arg(long, help = "Load TLS certificate from <CERT>. [default: cert.pem]")]
    pub cert: Option<PathBuf>,

    #[arg(long, help = "Load TLS private key from <KEY>. [default: key.pem]")]
    pub key: Option<PathBuf>,

    #[arg(
        long,
        help = "Disconnect Xatum miners silent for <MINER_TIMEOUT> seconds. [default: 60]"
    )]
    pub miner_timeout: Option<u64>,

    #[arg(
        long,
        help = "Allow <MAX_CONNECTIONS_PER_IP> Xatum miners per IP. [default: 100]"
    )]
    pub max_connections_per_ip: Option<u32>,

    #[arg(long, help = "Enable debug logging.")]
    pub debug: bool,
}
