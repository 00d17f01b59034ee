use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    arguments::Arguments,
    bridge::SocketSet,
    byteorder::{BigEndian, ByteOrder},
    clap::Parser,
    derive_more::Display,
    extranonce::{EXTRANONCE_PREFIX_SIZE, partition, validate_extranonces},
    futures::{sink::SinkExt, stream::StreamExt},
    job::{ConnJob, Job, JobSlot},
    options::Options,
    parking_lot::Mutex,
    pow::{Hash, ScratchPad},
    primitive_types::U256,
    proxy_core::ProxyCore,
    rand::RngCore,
    relay::{ShareReceiver, ShareSender},
    serde::{Deserialize, Serialize},
    server::Registry,
    settings::Settings,
    snafu::Snafu,
    std::{
        collections::{BTreeMap, HashMap},
        env,
        fmt::{self, Formatter},
        fs, io,
        net::{IpAddr, SocketAddr},
        path::PathBuf,
        process,
        str::FromStr,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::{Duration, Instant, SystemTime, UNIX_EPOCH},
    },
    target::{check_diff, target},
    tokio::{
        net::TcpListener,
        runtime::Runtime,
        sync::mpsc,
        task::{self, JoinSet},
        time::{sleep, timeout},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, trace, warn},
    upstream::Upstream,
    work_unit::{WORK_UNIT_SIZE, WorkUnit},
    xatum::{Frame, Handshake, Print, PrintLevel, Submit},
};

mod arguments;
mod bridge;
pub mod extranonce;
pub mod job;
mod logs;
pub mod options;
pub mod pow;
mod proxy_core;
mod relay;
mod server;
pub mod settings;
mod signal;
mod subcommand;
pub mod target;
mod upstream;
pub mod work_unit;

pub const USER_AGENT: &str = concat!("xelproxy/", env!("CARGO_PKG_VERSION"));
pub const ALGORITHM: &str = "xel/0";
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024;
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(20);
pub const KEEPALIVE_MARGIN: Duration = Duration::from_secs(5);
pub const INITIAL_JOB_DELAY: Duration = Duration::from_secs(2);

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub fn main() {
    let args = Arguments::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = signal::setup_signal_handler();

            match args.run(cancel_token).await {
                Err(err) => {
                    eprintln!("error: {err}");

                    for (i, cause) in err.chain().skip(1).enumerate() {
                        if i == 0 {
                            eprintln!();
                            eprintln!("because:");
                        }
                        eprintln!("- {cause}");
                    }

                    if env::var_os("RUST_BACKTRACE")
                        .map(|val| val == "1")
                        .unwrap_or_default()
                    {
                        eprintln!();
                        eprintln!("{}", err.backtrace());
                    }
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}

fn banner() {
    info!(
        "{USER_AGENT} on {} {} with {} CPUs",
        env::consts::OS,
        env::consts::ARCH,
        std::thread::available_parallelism()
            .map(|cpus| cpus.get())
            .unwrap_or(1)
    );
}
