use {
    super::*,
    futures::{SinkExt, StreamExt},
    rustls::pki_types::ServerName,
    std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    },
    tokio::{
        io::{AsyncRead, AsyncWrite, AsyncWriteExt},
        net::TcpStream,
        sync::{Mutex, mpsc},
        task::JoinHandle,
        time::{Instant, timeout},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, trace, warn},
};

pub use error::ClientError;

mod error;
mod tls;

pub type Result<T = (), E = ClientError> = std::result::Result<T, E>;

const MAX_FRAME_SIZE: usize = 64 * 1024;

type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, LinesCodec>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub connect_timeout: Duration,
    /// Transport deadline for each received line.
    pub read_timeout: Duration,
    /// Deadline for each outgoing line. A write that misses it ends the session.
    pub write_timeout: Duration,
    /// Pool silence tolerated between jobs before the link is declared dead.
    pub liveness_timeout: Duration,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(20),
            liveness_timeout: Duration::from_secs(60),
        }
    }
}

/// The three result streams of a pool session. Each holds a single pending
/// item, so a slow consumer stalls the reader instead of buffering.
///
/// All three close when the session ends.
pub struct Events {
    pub jobs: mpsc::Receiver<Job>,
    pub prints: mpsc::Receiver<Print>,
    pub success: mpsc::Receiver<Success>,
}

pub struct Client {
    link: Arc<Link>,
    reader: JoinHandle<()>,
}

impl Client {
    /// Dials the pool over TLS. Pool certificates are self-signed, so the
    /// peer certificate is not verified.
    pub async fn connect(config: ClientConfig) -> Result<(Self, Events)> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(&config.address))
            .await
            .context(error::TimeoutSnafu)?
            .context(error::IoSnafu)?;

        stream.set_nodelay(true).context(error::IoSnafu)?;

        let host = config
            .address
            .rsplit_once(':')
            .map_or(config.address.as_str(), |(host, _port)| host)
            .to_string();

        let server_name =
            ServerName::try_from(host.clone()).context(error::ServerNameSnafu { host })?;

        let stream = timeout(
            config.connect_timeout,
            tls::connector()?.connect(server_name, stream),
        )
        .await
        .context(error::TimeoutSnafu)?
        .context(error::TlsSnafu)?;

        debug!("Connected to pool at {}", config.address);

        Ok(Self::from_stream(config, stream))
    }

    /// Runs a session over an already established stream.
    pub fn from_stream<S>(config: ClientConfig, stream: S) -> (Self, Events)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);

        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);

        let link = Arc::new(Link {
            writer: Mutex::new(FramedWrite::new(writer, LinesCodec::new())),
            alive: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            write_timeout: config.write_timeout,
        });

        let (jobs_tx, jobs) = mpsc::channel(1);
        let (prints_tx, prints) = mpsc::channel(1);
        let (success_tx, success) = mpsc::channel(1);

        let reader = Reader {
            config,
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_SIZE)),
            link: link.clone(),
            jobs: jobs_tx,
            prints: prints_tx,
            success: success_tx,
            last_job: Instant::now(),
        };

        let reader = tokio::spawn(reader.run());

        (
            Self { link, reader },
            Events {
                jobs,
                prints,
                success,
            },
        )
    }

    pub async fn handshake(&self, handshake: &Handshake) -> Result {
        self.send(HANDSHAKE, handshake).await
    }

    pub async fn submit(&self, submit: &Submit) -> Result {
        if !self.is_alive() {
            return error::NotConnectedSnafu.fail();
        }

        self.send(SUBMIT, submit).await
    }

    pub async fn send(&self, name: &str, payload: &impl Serialize) -> Result {
        let frame = Frame::new(name, payload).context(error::FrameSnafu)?;
        self.link.write(frame).await
    }

    pub fn is_alive(&self) -> bool {
        self.link.alive.load(Ordering::SeqCst)
    }

    /// Ends the session. Safe to call more than once, and never waits
    /// behind a stalled write.
    pub async fn close(&self) {
        self.reader.abort();
        self.link.close().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.link.kill();
        self.reader.abort();
    }
}

/// The write side of a session, shared by the client and its reader.
struct Link {
    writer: Mutex<Writer>,
    alive: AtomicBool,
    /// Cancelled once the session is over. Pending writes give up the writer
    /// as soon as it fires.
    shutdown: CancellationToken,
    write_timeout: Duration,
}

impl Link {
    async fn write(&self, frame: Frame) -> Result {
        let line = frame.to_string();
        trace!(">>> {line}");

        let writer = &self.writer;

        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return error::NotConnectedSnafu.fail(),
            result = timeout(self.write_timeout, async move {
                writer.lock().await.send(line).await
            }) => result,
        };

        let result = result
            .context(error::WriteTimeoutSnafu {
                timeout: self.write_timeout,
            })
            .and_then(|sent| sent.context(error::CodecSnafu));

        if result.is_err() {
            self.kill();
        }

        result
    }

    fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    async fn close(&self) {
        self.kill();

        let Ok(mut writer) = timeout(self.write_timeout, self.writer.lock()).await else {
            debug!("Pool writer still busy, leaving it to drop");
            return;
        };

        match timeout(self.write_timeout, writer.get_mut().shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("Closing pool connection failed: {err}"),
            Err(_) => debug!("Closing pool connection timed out"),
        }
    }
}

struct Reader<R> {
    config: ClientConfig,
    lines: FramedRead<R, LinesCodec>,
    link: Arc<Link>,
    jobs: mpsc::Sender<Job>,
    prints: mpsc::Sender<Print>,
    success: mpsc::Sender<Success>,
    last_job: Instant,
}

impl<R> Reader<R>
where
    R: AsyncRead + Unpin,
{
    async fn run(mut self) {
        match self.read_loop().await {
            Ok(()) => info!("Pool connection closed"),
            Err(err) => warn!("Pool connection closed: {err}"),
        }

        let Self {
            link,
            jobs,
            prints,
            success,
            ..
        } = self;

        link.kill();

        // Closing the streams first lets the consumer see the end of the
        // session even if the socket close stalls.
        drop((jobs, prints, success));

        link.close().await;
    }

    async fn read_loop(&mut self) -> Result {
        loop {
            let line = tokio::select! {
                _ = self.link.shutdown.cancelled() => return Ok(()),
                line = timeout(self.config.read_timeout, self.lines.next()) => line,
            };

            let line = match line {
                Err(_) => {
                    return error::ReadTimeoutSnafu {
                        timeout: self.config.read_timeout,
                    }
                    .fail();
                }
                Ok(None) => return Ok(()),
                Ok(Some(line)) => line.context(error::CodecSnafu)?,
            };

            trace!("<<< {line}");

            let frame = match line.parse::<Frame>() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("Ignoring packet from pool: {err}");
                    continue;
                }
            };

            if !frame.is(JOB) {
                let elapsed = self.last_job.elapsed();

                if elapsed > self.config.liveness_timeout {
                    error!(
                        "No jobs received in the last {}s, reconnecting",
                        elapsed.as_secs()
                    );
                    return error::StaleSnafu { elapsed }.fail();
                }
            }

            match frame.name.as_str() {
                JOB => {
                    let job = frame.decode::<Job>().context(error::FrameSnafu)?;
                    debug!("Received job with difficulty {}", job.diff);
                    self.jobs
                        .send(job)
                        .await
                        .map_err(|_| ClientError::StreamClosed)?;
                    self.last_job = Instant::now();
                }
                PRINT => {
                    let print = frame.decode::<Print>().context(error::FrameSnafu)?;
                    self.prints
                        .send(print)
                        .await
                        .map_err(|_| ClientError::StreamClosed)?;
                }
                SUCCESS => {
                    let success = frame.decode::<Success>().context(error::FrameSnafu)?;
                    self.success
                        .send(success)
                        .await
                        .map_err(|_| ClientError::StreamClosed)?;
                }
                PING => {
                    let pong = Frame::new(PONG, &Empty {}).context(error::FrameSnafu)?;
                    self.link.write(pong).await?;
                }
                HANDSHAKE => debug!("Pool echoed handshake"),
                name => warn!("Unknown packet `{name}` from pool"),
            }
        }
    }
}
