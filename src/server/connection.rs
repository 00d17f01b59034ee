use {
    super::*,
    tokio::io::{AsyncRead, AsyncWrite},
    tokio_util::codec::LinesCodecError,
    xatum::{Empty, HANDSHAKE, JOB, PING, PONG, PRINT, SUBMIT},
};

type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, LinesCodec>;

/// Why a miner was disconnected.
#[derive(Debug, Snafu)]
pub(crate) enum Kick {
    #[snafu(display("first packet must be a handshake, got `{name}`"))]
    FirstPacketNotHandshake { name: String },
    #[snafu(display("more than one handshake received"))]
    DuplicateHandshake,
    #[snafu(display("invalid handshake: {source}"))]
    InvalidHandshake { source: xatum::Error },
    #[snafu(display("miner does not support algorithm {ALGORITHM}"))]
    UnsupportedAlgorithm,
    #[snafu(display("{source}"))]
    MalformedFrame { source: xatum::Error },
    #[snafu(display("unknown packet `{name}`"))]
    UnknownPacket { name: String },
    #[snafu(display("no data within {}s", timeout.as_secs()))]
    ReadTimeout { timeout: Duration },
    #[snafu(display("read failed: {source}"))]
    Read { source: LinesCodecError },
    #[snafu(display("failed to encode `{name}`: {source}"))]
    Encode { name: String, source: xatum::Error },
    #[snafu(display("write failed: {source}"))]
    Write { source: LinesCodecError },
    #[snafu(display("write timed out after {}s", WRITE_TIMEOUT.as_secs()))]
    WriteTimeout,
}

impl Kick {
    /// The message shown to the miner, for violations the miner caused.
    pub(crate) fn notice(&self) -> Option<String> {
        match self {
            Self::FirstPacketNotHandshake { .. } => Some("first packet must be a handshake".into()),
            Self::DuplicateHandshake => Some("more than one handshake received".into()),
            Self::InvalidHandshake { .. } => Some("failed to parse data".into()),
            Self::UnsupportedAlgorithm => Some(format!(
                "your miner does not support algorithm {ALGORITHM}"
            )),
            Self::MalformedFrame { .. } => Some("malformed packet data".into()),
            Self::UnknownPacket { name } => Some(format!("unknown packet {name}")),
            Self::ReadTimeout { .. }
            | Self::Read { .. }
            | Self::Encode { .. }
            | Self::Write { .. }
            | Self::WriteTimeout => None,
        }
    }
}

/// How a submitted share relates to the jobs this miner was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum ShareStatus {
    #[display("current")]
    Current,
    #[display("previous")]
    Previous,
    #[display("duplicate")]
    Duplicate,
    #[display("stale")]
    Stale,
    #[display("malformed")]
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingHandshake,
    Active,
}

struct Outbound {
    writer: Writer,
    current_job: Option<ConnJob>,
    last_job: Option<ConnJob>,
}

struct Miner {
    wallet: Option<String>,
    last_share: Instant,
    score: i64,
}

/// One Xatum miner. Writes and per-miner jobs share a lock so a keepalive and
/// a job send never interleave on the socket.
pub(crate) struct Connection {
    pub(crate) id: u64,
    pub(crate) peer: SocketAddr,
    active: AtomicBool,
    cancel_token: CancellationToken,
    outbound: tokio::sync::Mutex<Outbound>,
    miner: Mutex<Miner>,
}

impl Connection {
    pub(crate) fn new(
        peer: SocketAddr,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id: rand::rng().next_u64(),
            peer,
            active: AtomicBool::new(false),
            cancel_token,
            outbound: tokio::sync::Mutex::new(Outbound {
                writer: FramedWrite::new(writer, LinesCodec::new()),
                current_job: None,
                last_job: None,
            }),
            miner: Mutex::new(Miner {
                wallet: None,
                last_share: Instant::now(),
                score: 0,
            }),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub(crate) fn activate(&self, wallet: String) {
        self.miner.lock().wallet = Some(wallet);
        self.active.store(true, Ordering::SeqCst);
    }

    pub(crate) fn wallet(&self) -> Option<String> {
        self.miner.lock().wallet.clone()
    }

    pub(crate) fn score(&self) -> i64 {
        self.miner.lock().score
    }

    pub(crate) fn last_share(&self) -> Instant {
        self.miner.lock().last_share
    }

    pub(crate) async fn current_job(&self) -> Option<ConnJob> {
        self.outbound.lock().await.current_job.clone()
    }

    pub(crate) async fn send(&self, name: &str, payload: &impl Serialize) -> Result<(), Kick> {
        let frame = Frame::new(name, payload).map_err(|source| Kick::Encode {
            name: name.into(),
            source,
        })?;
        write(&mut self.outbound.lock().await.writer, frame).await
    }

    /// Sends `job` with a freshly partitioned extranonce. The previous job is
    /// kept so late shares can still be matched.
    pub(crate) async fn send_job(&self, job: &Job) -> Result<(), Kick> {
        let work_unit = partition(&job.work_unit);

        let frame = Frame::new(
            JOB,
            &xatum::Job {
                diff: job.difficulty,
                blob: work_unit.as_bytes().as_slice().into(),
            },
        )
        .map_err(|source| Kick::Encode {
            name: JOB.into(),
            source,
        })?;

        let mut outbound = self.outbound.lock().await;
        outbound.last_job = outbound
            .current_job
            .replace(ConnJob::new(job.difficulty, work_unit));

        debug!(
            "Sending job with difficulty {} to {}",
            job.difficulty, self.peer
        );

        write(&mut outbound.writer, frame).await
    }

    /// Best-effort operator message at error level.
    pub(crate) async fn notify(&self, message: &str) {
        if let Err(err) = self.send(PRINT, &Print::error(message)).await {
            debug!("Failed to notify {}: {err}", self.peer);
        }
    }

    /// Matches a share against the current job, then the previous one, and
    /// records its nonce.
    pub(crate) async fn record_share(&self, data: &[u8]) -> ShareStatus {
        let status = match WorkUnit::try_from(data) {
            Err(_) => ShareStatus::Malformed,
            Ok(unit) => {
                let mut outbound = self.outbound.lock().await;
                let outbound = &mut *outbound;

                if let Some(job) = outbound.current_job.as_mut().filter(|job| job.matches(&unit)) {
                    if job.record(unit.nonce()) {
                        ShareStatus::Current
                    } else {
                        ShareStatus::Duplicate
                    }
                } else if let Some(job) = outbound.last_job.as_mut().filter(|job| job.matches(&unit))
                {
                    if job.record(unit.nonce()) {
                        ShareStatus::Previous
                    } else {
                        ShareStatus::Duplicate
                    }
                } else {
                    ShareStatus::Stale
                }
            }
        };

        let mut miner = self.miner.lock();
        miner.last_share = Instant::now();
        miner.score += match status {
            ShareStatus::Current | ShareStatus::Previous => 1,
            _ => -1,
        };

        status
    }

    /// Idempotent. Stops the reader and keepalive, then closes the socket.
    pub(crate) async fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.cancel_token.cancel();

        let mut outbound = self.outbound.lock().await;

        match timeout(WRITE_TIMEOUT, SinkExt::<String>::close(&mut outbound.writer)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("Closing connection to {} failed: {err}", self.peer),
            Err(_) => debug!("Closing connection to {} timed out", self.peer),
        }
    }
}

async fn write(writer: &mut Writer, frame: Frame) -> Result<(), Kick> {
    let line = frame.to_string();
    trace!(">>> {line}");

    timeout(WRITE_TIMEOUT, writer.send(line))
        .await
        .map_err(|_| Kick::WriteTimeout)?
        .map_err(|source| Kick::Write { source })
}

/// Runs one miner from accept to disconnect.
pub(crate) async fn serve<S>(
    core: Arc<ProxyCore>,
    stream: S,
    peer: SocketAddr,
    miner_timeout: Duration,
    cancel_token: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);

    let connection = Arc::new(Connection::new(peer, Box::new(writer), cancel_token));

    if !core.miners.admit(connection.clone()).await {
        debug!("Rejecting {peer}: connections per IP limit reached");
        connection.close().await;
        return;
    }

    info!("Miner {peer} connected ({:016x})", connection.id);

    let mut session = Session {
        core: core.clone(),
        connection: connection.clone(),
        lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
        phase: Phase::AwaitingHandshake,
        miner_timeout,
    };

    match session.serve().await {
        Ok(()) => info!(
            "Miner {peer} ({}) disconnected (score {}, last share {}s ago)",
            connection.wallet().as_deref().unwrap_or("no handshake"),
            connection.score(),
            connection.last_share().elapsed().as_secs()
        ),
        Err(kick) => {
            warn!("Kicking miner {peer}: {kick}");

            if let Some(notice) = kick.notice() {
                connection.notify(&notice).await;
            }
        }
    }

    core.miners.kick(connection.id).await;
}

struct Session<R> {
    core: Arc<ProxyCore>,
    connection: Arc<Connection>,
    lines: FramedRead<R, LinesCodec>,
    phase: Phase,
    miner_timeout: Duration,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    async fn serve(&mut self) -> Result<(), Kick> {
        while let Some(line) = self.read_line().await? {
            trace!("<<< {line}");

            let frame = line
                .parse::<Frame>()
                .map_err(|source| Kick::MalformedFrame { source })?;

            match (self.phase, frame.name.as_str()) {
                (Phase::AwaitingHandshake, HANDSHAKE) => self.on_handshake(&frame).await?,
                (Phase::AwaitingHandshake, name) => {
                    return FirstPacketNotHandshakeSnafu { name }.fail();
                }
                (Phase::Active, HANDSHAKE) => return DuplicateHandshakeSnafu.fail(),
                (Phase::Active, SUBMIT) => self.on_submit(&frame).await,
                (Phase::Active, PONG) => trace!("Pong from {}", self.connection.peer),
                (Phase::Active, name) => return UnknownPacketSnafu { name }.fail(),
            }
        }

        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>, Kick> {
        tokio::select! {
            _ = self.connection.cancel_token.cancelled() => Ok(None),
            line = timeout(self.miner_timeout, self.lines.next()) => match line {
                Err(_) => ReadTimeoutSnafu { timeout: self.miner_timeout }.fail(),
                Ok(None) => Ok(None),
                Ok(Some(line)) => line.map(Some).map_err(|source| Kick::Read { source }),
            },
        }
    }

    async fn on_handshake(&mut self, frame: &Frame) -> Result<(), Kick> {
        let handshake = frame
            .decode::<Handshake>()
            .map_err(|source| Kick::InvalidHandshake { source })?;

        if !handshake.supports(ALGORITHM) {
            return UnsupportedAlgorithmSnafu.fail();
        }

        info!(
            "New miner {} | address: {} worker: {} agent: {} algorithms: {:?}",
            self.connection.peer,
            handshake.address,
            handshake.worker,
            handshake.agent,
            handshake.algorithms
        );

        self.connection.activate(handshake.address);
        self.phase = Phase::Active;

        keepalive(
            self.core.clone(),
            self.connection.clone(),
            self.miner_timeout.saturating_sub(KEEPALIVE_MARGIN),
        );

        match self.core.jobs.current() {
            Some(job) => self.connection.send_job(&job).await?,
            None => debug!(
                "No job yet for {}, waiting for the next one",
                self.connection.peer
            ),
        }

        Ok(())
    }

    async fn on_submit(&mut self, frame: &Frame) {
        let peer = self.connection.peer;

        let submit = match frame.decode::<Submit>() {
            Ok(submit) => submit,
            Err(err) => {
                warn!("Invalid share from {peer}: {err}");
                self.connection.notify("failed to parse data").await;
                return;
            }
        };

        match self.connection.record_share(submit.data.as_bytes()).await {
            status @ (ShareStatus::Current | ShareStatus::Previous) => {
                debug!("Share {} from {peer} ({status} job)", submit.hash);
            }
            status => warn!("Relaying {status} share {} from {peer}", submit.hash),
        }

        if self.core.shares.send(submit).await.is_err() {
            warn!("Share relay closed, dropping share from {peer}");
        }
    }
}

/// Pings the miner every `interval` until it disconnects. A failed ping kicks it.
fn keepalive(core: Arc<ProxyCore>, connection: Arc<Connection>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = connection.cancel_token.cancelled() => break,
                _ = sleep(interval) => {}
            }

            if let Err(err) = connection.send(PING, &Empty {}).await {
                warn!("Keepalive to {} failed: {err}", connection.peer);
                core.miners.kick(connection.id).await;
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        pretty_assertions::assert_eq,
        tokio::{
            io::{
                AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf,
                WriteHalf,
            },
            task::JoinHandle,
        },
    };

    struct TestMiner {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
        server: JoinHandle<()>,
    }

    impl TestMiner {
        fn connect(core: &Arc<ProxyCore>) -> Self {
            Self::connect_from(core, "10.0.0.1:4000", Duration::from_secs(60))
        }

        fn connect_from(core: &Arc<ProxyCore>, peer: &str, miner_timeout: Duration) -> Self {
            let (server_io, miner_io) = tokio::io::duplex(64 * 1024);

            let server = tokio::spawn(serve(
                core.clone(),
                server_io,
                peer.parse().unwrap(),
                miner_timeout,
                CancellationToken::new(),
            ));

            let (reader, writer) = tokio::io::split(miner_io);

            Self {
                lines: BufReader::new(reader).lines(),
                writer,
                server,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .unwrap();
        }

        async fn handshake(&mut self, algorithms: &[&str]) {
            let frame = Frame::new(
                HANDSHAKE,
                &Handshake {
                    address: "xel:miner".into(),
                    worker: "rig".into(),
                    agent: "test/1.0".into(),
                    algorithms: algorithms.iter().map(|a| a.to_string()).collect(),
                },
            )
            .unwrap();

            self.send(&frame.to_string()).await;
        }

        async fn recv(&mut self) -> Option<Frame> {
            timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .map(|line| line.parse().unwrap())
        }

        async fn closed(self) {
            timeout(Duration::from_secs(5), self.server)
                .await
                .unwrap()
                .unwrap();
        }
    }

    async fn until_active(core: &ProxyCore, count: usize) {
        timeout(Duration::from_secs(5), async {
            while core.miners.active().await != count {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn pool_job(difficulty: u64) -> Job {
        let mut extranonce = [0x5a; 32];
        extranonce[28..].fill(0);
        Job::new(difficulty, WorkUnit::fixed([1; 32], extranonce, [3; 32]))
    }

    fn notice(frame: &Frame) -> String {
        assert_eq!(frame.name, PRINT);
        let print = frame.decode::<Print>().unwrap();
        assert_eq!(print.lvl, 3);
        print.msg
    }

    fn work_unit(frame: &Frame) -> (u64, WorkUnit) {
        assert_eq!(frame.name, JOB);
        let job = frame.decode::<xatum::Job>().unwrap();
        (job.diff, WorkUnit::try_from(job.blob.as_bytes()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn silent_miner_is_dropped_at_read_deadline() {
        let (core, _shares) = ProxyCore::for_tests();

        let started = tokio::time::Instant::now();
        let mut miner = TestMiner::connect_from(&core, "10.0.0.1:4000", Duration::from_secs(10));

        let line = timeout(Duration::from_secs(30), miner.lines.next_line())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(line, None, "a timed out miner gets no notice");
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(11));

        miner.closed().await;
        assert_eq!(core.miners.len().await, 0);
    }

    #[tokio::test]
    async fn connection_over_ip_limit_never_registers() {
        let (core, _shares) = ProxyCore::for_tests_with_limit(0);
        let ip = "10.0.0.9".parse().unwrap();

        let mut first = TestMiner::connect_from(&core, "10.0.0.9:1", Duration::from_secs(60));
        first.handshake(&[ALGORITHM]).await;
        until_active(&core, 1).await;

        let mut second = TestMiner::connect_from(&core, "10.0.0.9:2", Duration::from_secs(60));
        assert!(second.recv().await.is_none());
        second.closed().await;

        assert_eq!(core.miners.len().await, 1);
        assert_eq!(core.miners.connections_from(ip).await, 1);

        let mut other = TestMiner::connect_from(&core, "10.0.0.10:1", Duration::from_secs(60));
        other.handshake(&[ALGORITHM]).await;
        until_active(&core, 2).await;

        assert_eq!(core.miners.len().await, 2);
    }

    #[tokio::test]
    async fn first_packet_must_be_handshake() {
        let (core, _shares) = ProxyCore::for_tests();
        core.jobs.replace(pool_job(10));

        let mut miner = TestMiner::connect(&core);
        miner.send(r#"submit~{"data":"AA==","hash":"00"}"#).await;

        assert_eq!(
            notice(&miner.recv().await.unwrap()),
            "first packet must be a handshake"
        );
        assert!(miner.recv().await.is_none());

        miner.closed().await;
        assert_eq!(core.miners.len().await, 0);
        assert_eq!(core.miners.active().await, 0);
    }

    #[tokio::test]
    async fn unsupported_algorithm_gets_no_job() {
        let (core, _shares) = ProxyCore::for_tests();
        core.jobs.replace(pool_job(10));

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&["other/1"]).await;

        assert_eq!(
            notice(&miner.recv().await.unwrap()),
            "your miner does not support algorithm xel/0"
        );
        assert!(miner.recv().await.is_none());

        miner.closed().await;
        assert_eq!(core.miners.len().await, 0);
    }

    #[tokio::test]
    async fn second_handshake_is_rejected() {
        let (core, _shares) = ProxyCore::for_tests();

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&[ALGORITHM]).await;
        until_active(&core, 1).await;

        miner.handshake(&[ALGORITHM]).await;

        assert_eq!(
            notice(&miner.recv().await.unwrap()),
            "more than one handshake received"
        );
        assert!(miner.recv().await.is_none());

        miner.closed().await;
        assert_eq!(core.miners.len().await, 0);
    }

    #[tokio::test]
    async fn handshake_with_current_job_sends_partitioned_job() {
        let (core, _shares) = ProxyCore::for_tests();
        let job = pool_job(500);
        core.jobs.replace(job);

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&["other/1", ALGORITHM]).await;

        let (difficulty, unit) = work_unit(&miner.recv().await.unwrap());

        assert_eq!(difficulty, 500);
        assert_eq!(unit.workhash(), job.work_unit.workhash());
        assert!(validate_extranonces(
            &unit.extranonce(),
            &job.work_unit.extranonce()
        ));
    }

    #[tokio::test]
    async fn job_arriving_after_handshake_is_delivered_once() {
        let (core, _shares) = ProxyCore::for_tests();

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&[ALGORITHM]).await;
        until_active(&core, 1).await;

        let job = pool_job(1000);
        core.publish(job);

        let (difficulty, unit) = work_unit(&miner.recv().await.unwrap());

        assert_eq!(difficulty, 1000);
        assert_eq!(
            unit.extranonce()[..EXTRANONCE_PREFIX_SIZE],
            job.work_unit.extranonce()[..EXTRANONCE_PREFIX_SIZE]
        );
        assert_ne!(unit.extranonce()[EXTRANONCE_PREFIX_SIZE..], [0; 4]);

        miner.send("pong~{}").await;
        miner.send("bogus~{}").await;

        assert_eq!(notice(&miner.recv().await.unwrap()), "unknown packet bogus");
        assert!(miner.recv().await.is_none());
    }

    #[tokio::test]
    async fn shares_are_relayed_and_tracked() {
        let (core, mut shares) = ProxyCore::for_tests();
        core.jobs.replace(pool_job(10));

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&[ALGORITHM]).await;

        let (_, mut unit) = work_unit(&miner.recv().await.unwrap());
        unit.set_nonce(42);

        let submit = Submit {
            data: unit.as_bytes().as_slice().into(),
            hash: "ab".repeat(32),
        };

        miner
            .send(&Frame::new(SUBMIT, &submit).unwrap().to_string())
            .await;

        assert_eq!(shares.recv().await.unwrap(), submit);

        let connection = core.miners.first().await.unwrap();
        assert_eq!(connection.wallet().as_deref(), Some("xel:miner"));
        assert_eq!(connection.score(), 1);
        assert_eq!(
            connection.current_job().await.unwrap().submitted_nonces,
            vec![42]
        );

        miner
            .send(&Frame::new(SUBMIT, &submit).unwrap().to_string())
            .await;

        assert_eq!(shares.recv().await.unwrap(), submit);
        assert_eq!(connection.score(), 0);
    }

    #[tokio::test]
    async fn undecodable_submit_keeps_connection() {
        let (core, mut shares) = ProxyCore::for_tests();

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&[ALGORITHM]).await;

        miner.send(r#"submit~{"data":"!!!","hash":"00"}"#).await;
        assert_eq!(notice(&miner.recv().await.unwrap()), "failed to parse data");

        miner.send(r#"submit~{"data":"AQID","hash":"00"}"#).await;
        assert_eq!(shares.recv().await.unwrap().data.as_bytes(), &[1, 2, 3]);
        assert_eq!(core.miners.active().await, 1);
    }

    #[tokio::test]
    async fn malformed_frame_is_fatal() {
        let (core, _shares) = ProxyCore::for_tests();

        let mut miner = TestMiner::connect(&core);
        miner.send("garbage without separator").await;

        assert_eq!(notice(&miner.recv().await.unwrap()), "malformed packet data");
        assert!(miner.recv().await.is_none());
    }

    #[tokio::test]
    async fn stale_shares_are_still_relayed() {
        let (core, mut shares) = ProxyCore::for_tests();
        core.jobs.replace(pool_job(10));

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&[ALGORITHM]).await;
        miner.recv().await.unwrap();

        let foreign = WorkUnit::fixed([1; 32], [0xee; 32], [3; 32]);

        miner
            .send(
                &Frame::new(
                    SUBMIT,
                    &Submit {
                        data: foreign.as_bytes().as_slice().into(),
                        hash: "00".into(),
                    },
                )
                .unwrap()
                .to_string(),
            )
            .await;

        assert_eq!(
            shares.recv().await.unwrap().data.as_bytes(),
            foreign.as_bytes()
        );
        assert_eq!(core.miners.first().await.unwrap().score(), -1);
    }

    #[tokio::test]
    async fn late_share_matches_previous_job() {
        let connection = Connection::new(
            "10.0.0.1:1".parse().unwrap(),
            Box::new(tokio::io::sink()),
            CancellationToken::new(),
        );

        let old = Job::new(1, WorkUnit::fixed([1; 32], [1; 32], [1; 32]));
        let new = Job::new(1, WorkUnit::fixed([2; 32], [2; 32], [2; 32]));

        connection.send_job(&old).await.unwrap();
        let sent = connection.current_job().await.unwrap().work_unit;
        connection.send_job(&new).await.unwrap();

        assert_eq!(
            connection.record_share(sent.as_bytes()).await,
            ShareStatus::Previous
        );
        assert_eq!(
            connection.record_share(sent.as_bytes()).await,
            ShareStatus::Duplicate
        );
        assert_eq!(
            connection.record_share(&[0; 12]).await,
            ShareStatus::Malformed
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let connection = Connection::new(
            "10.0.0.1:1".parse().unwrap(),
            Box::new(tokio::io::sink()),
            CancellationToken::new(),
        );

        connection.activate("xel:wallet".into());
        connection.close().await;
        connection.close().await;

        assert!(connection.is_closed());
        assert!(!connection.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_before_timeout() {
        let (core, _shares) = ProxyCore::for_tests();

        let mut miner = TestMiner::connect(&core);
        miner.handshake(&[ALGORITHM]).await;

        let started = tokio::time::Instant::now();

        let ping = timeout(Duration::from_secs(120), miner.lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
            .parse::<Frame>()
            .unwrap();

        assert_eq!(ping.name, PING);
        assert_eq!(ping.payload, "{}");
        assert!(started.elapsed() >= Duration::from_secs(55));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn only_miner_violations_carry_a_notice() {
        assert!(Kick::DuplicateHandshake.notice().is_some());
        assert!(Kick::WriteTimeout.notice().is_none());
        assert!(
            Kick::ReadTimeout {
                timeout: Duration::from_secs(60)
            }
            .notice()
            .is_none()
        );
    }
}
