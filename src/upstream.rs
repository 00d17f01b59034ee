use {
    super::*,
    futures::future::{BoxFuture, FutureExt},
    parking_lot::RwLock,
    xatum::{Client, ClientConfig, ClientError, Events, Success},
};

pub(crate) use supervisor::{ReconnectPolicy, State, Transition};

mod supervisor;

/// Opens one pool session.
type Dialer =
    Box<dyn Fn(ClientConfig) -> BoxFuture<'static, Result<(Client, Events), ClientError>> + Send + Sync>;

/// Owns the single pool session and reconnects it forever.
pub(crate) struct Upstream {
    address: String,
    wallet: String,
    policy: ReconnectPolicy,
    dial: Dialer,
    client: RwLock<Option<Arc<Client>>>,
    state: Mutex<State>,
}

impl Upstream {
    pub(crate) fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            address: settings.pool().to_string(),
            wallet: settings.wallet()?.to_string(),
            policy: ReconnectPolicy::default(),
            dial: Box::new(|config| Client::connect(config).boxed()),
            client: RwLock::new(None),
            state: Mutex::new(State::Disconnected),
        })
    }

    pub(crate) fn state(&self) -> State {
        *self.state.lock()
    }

    /// The live session, if any.
    pub(crate) fn client(&self) -> Option<Arc<Client>> {
        self.client
            .read()
            .as_ref()
            .filter(|client| client.is_alive())
            .cloned()
    }

    fn transition(&self, transition: Transition) {
        let mut state = self.state.lock();
        let next = state.next(transition);

        if next != *state {
            debug!("Upstream {} -> {next}", *state);
            *state = next;
        }
    }

    fn install(&self, client: Option<Arc<Client>>) -> Option<Arc<Client>> {
        std::mem::replace(&mut *self.client.write(), client)
    }

    pub(crate) fn spawn(
        self: Arc<Self>,
        core: Arc<ProxyCore>,
        cancel_token: CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        tasks.spawn(async move { self.supervise(core, cancel_token).await });
    }

    async fn supervise(&self, core: Arc<ProxyCore>, cancel_token: CancellationToken) {
        let mut attempts = 0u64;

        loop {
            attempts += 1;

            self.transition(Transition::Dial);
            info!("Connecting to pool {} (attempt {attempts})", self.address);

            tokio::select! {
                result = self.session(&core) => match result {
                    Ok(()) => warn!("Pool {} closed the session", self.address),
                    Err(err) => warn!("Pool session failed: {err:#}"),
                },
                _ = cancel_token.cancelled() => {
                    self.shutdown().await;
                    break;
                }
            }

            self.transition(Transition::Failed);

            if let Some(client) = self.install(None) {
                client.close().await;
            }

            if !self.policy.should_retry(attempts) {
                error!("Giving up on pool after {attempts} attempts");
                break;
            }

            tokio::select! {
                _ = sleep(self.policy.backoff) => {}
                _ = cancel_token.cancelled() => {
                    self.shutdown().await;
                    break;
                }
            }
        }
    }

    async fn session(&self, core: &Arc<ProxyCore>) -> Result {
        let (client, events) = (self.dial)(ClientConfig::new(&self.address))
            .await
            .with_context(|| format!("failed to connect to pool {}", self.address))?;

        self.transition(Transition::Connected);

        client
            .handshake(&Handshake {
                address: self.wallet.clone(),
                worker: "x".into(),
                agent: USER_AGENT.into(),
                algorithms: vec![ALGORITHM.into()],
            })
            .await
            .context("failed to send handshake to pool")?;

        self.install(Some(Arc::new(client)));
        self.transition(Transition::Handshaken);

        info!("Connected to pool {} as {}", self.address, self.wallet);

        consume(core, events).await;

        Ok(())
    }

    async fn shutdown(&self) {
        info!("Closing pool connection");

        self.transition(Transition::Failed);

        if let Some(client) = self.install(None) {
            client.close().await;
        }
    }
}

/// Drains one session's result streams until the session ends.
async fn consume(core: &Arc<ProxyCore>, mut events: Events) {
    loop {
        tokio::select! {
            Some(job) = events.jobs.recv() => match Job::from_pool(&job) {
                Ok(job) => {
                    info!("New job with difficulty {}", job.difficulty);
                    core.publish(job);
                }
                Err(err) => warn!("Dropping job from pool: {err:#}"),
            },
            Some(print) = events.prints.recv() => log_print(&print),
            Some(success) = events.success.recv() => log_success(&success),
            else => break,
        }
    }
}

fn log_print(print: &Print) {
    match print.level() {
        Some(PrintLevel::Verbose) => debug!("Pool: {}", print.msg),
        Some(PrintLevel::Info) => info!("Pool: {}", print.msg),
        Some(PrintLevel::Warn) => warn!("Pool: {}", print.msg),
        Some(PrintLevel::Error) => error!("Pool: {}", print.msg),
        None => info!("Pool (level {}): {}", print.lvl, print.msg),
    }
}

fn log_success(success: &Success) {
    if success.is_accepted() {
        info!("Share accepted by pool");
    } else {
        warn!("Share rejected by pool: {}", success.msg);
    }
}
