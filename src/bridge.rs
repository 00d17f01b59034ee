use {
    super::*,
    axum::{
        Router,
        extract::{
            ConnectInfo, State,
            ws::{Message, WebSocket, WebSocketUpgrade},
        },
        response::Response,
        routing::get,
    },
    axum_server::Handle,
    futures::Stream,
};

pub(crate) use sockets::SocketSet;

mod sockets;

/// Optimistic acknowledgement written back for every well-formed submission.
/// The pool makes the real decision.
pub(crate) const ACCEPTED: &str = r#""block_accepted""#;

const OUTBOUND_CAPACITY: usize = 16;

#[derive(Clone)]
struct Bridge {
    core: Arc<ProxyCore>,
    cancel_token: CancellationToken,
}

#[derive(Debug, Default, Deserialize)]
struct Submission {
    miner_work: Option<String>,
    block_template: Option<String>,
}

pub(crate) fn new_job_message(job: &Job) -> String {
    serde_json::json!({
        "new_job": {
            "difficulty": job.difficulty.to_string(),
            "height": 0,
            "topoheight": 0,
            "template": job.work_unit.to_hex(),
        }
    })
    .to_string()
}

/// Extracts the work unit from a getwork message. `Ok(None)` when the message
/// carries no work.
fn decode_submission(text: &str) -> Result<Option<WorkUnit>> {
    let submission = serde_json::from_str::<Submission>(text).context("invalid JSON")?;

    let Some(work) = submission.miner_work.or(submission.block_template) else {
        return Ok(None);
    };

    let bytes = hex::decode(work.trim()).context("invalid hex")?;

    ensure!(
        bytes.len() == WORK_UNIT_SIZE,
        "expected {WORK_UNIT_SIZE} bytes of work, got {}",
        bytes.len()
    );

    WorkUnit::try_from(bytes.as_slice()).map(Some)
}

fn share(work_unit: &WorkUnit, scratch_pad: &mut ScratchPad) -> Submit {
    Submit {
        data: work_unit.as_bytes().as_slice().into(),
        hash: hex::encode(work_unit.pow_hash(scratch_pad)),
    }
}

pub(crate) fn spawn(
    settings: &Settings,
    core: Arc<ProxyCore>,
    cancel_token: CancellationToken,
    tasks: &mut JoinSet<()>,
) -> Result {
    let address = settings.address();
    let port = settings.getwork_port();

    let listener = std::net::TcpListener::bind((address, port))
        .with_context(|| format!("failed to bind getwork server to {address}:{port}"))?;

    listener.set_nonblocking(true)?;

    info!("Getwork server listening on {address}:{port}");

    let router = Router::new().route("/", get(upgrade)).with_state(Bridge {
        core,
        cancel_token: cancel_token.clone(),
    });

    let server = axum_server::from_tcp(listener)
        .with_context(|| format!("failed to start getwork server on {address}:{port}"))?;

    let handle = Handle::new();

    let shutdown_handle = handle.clone();
    tasks.spawn(async move {
        cancel_token.cancelled().await;
        info!("Shutting down getwork server");
        shutdown_handle.shutdown();
    });

    tasks.spawn(async move {
        if let Err(err) = server
            .handle(handle)
            .serve(router.into_make_service_with_connect_info::<SocketAddr>())
            .await
        {
            error!("Getwork server error: {err}");
        }
    });

    Ok(())
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(bridge): State<Bridge>,
) -> Response {
    ws.on_upgrade(move |socket| serve(socket, peer, bridge))
}

async fn serve(socket: WebSocket, peer: SocketAddr, bridge: Bridge) {
    let (mut sink, stream) = socket.split();
    let (outbound, mut pending) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let cancel_token = bridge.cancel_token.child_token();

    let writer = {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            while let Some(text) = pending.recv().await {
                trace!(">>> {text}");

                if let Err(err) = sink.send(Message::Text(text.into())).await {
                    debug!("Write to getwork miner {peer} failed: {err}");
                    break;
                }
            }

            cancel_token.cancel();

            if let Err(err) = sink.close().await {
                debug!("Closing getwork socket {peer} failed: {err}");
            }
        })
    };

    session(bridge.core, peer, stream, outbound, cancel_token).await;

    if let Err(err) = writer.await {
        error!("Getwork writer for {peer} failed: {err}");
    }
}

/// Sends whatever job is current once the initial delay is over. Jobs published
/// during the delay may already have reached the socket, so the current one
/// goes out last.
fn push_current(core: &ProxyCore, peer: SocketAddr, outbound: &mpsc::Sender<String>) {
    core.jobs.with_current(|job| {
        let Some(job) = job else {
            return;
        };

        debug!("Sending first job to getwork miner {peer}");

        if let Err(err) = outbound.try_send(new_job_message(&job)) {
            warn!("Failed to send first job to getwork miner {peer}: {err}");
        }
    });
}

/// Registers the socket, schedules the initial job and processes submissions
/// until the miner goes away.
async fn session<S>(
    core: Arc<ProxyCore>,
    peer: SocketAddr,
    mut incoming: S,
    outbound: mpsc::Sender<String>,
    cancel_token: CancellationToken,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let id = core
        .sockets
        .register(peer, outbound.clone(), cancel_token.clone());

    info!("Getwork miner {peer} connected");

    if core.jobs.current().is_some() {
        let core = core.clone();
        let outbound = outbound.clone();
        let cancel_token = cancel_token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                _ = sleep(INITIAL_JOB_DELAY) => push_current(&core, peer, &outbound),
            }
        });
    } else {
        debug!("No job yet for getwork miner {peer}");
    }

    let mut scratch_pad = ScratchPad::new();

    loop {
        let message = tokio::select! {
            _ = cancel_token.cancelled() => break,
            message = incoming.next() => message,
        };

        let text = match message {
            None => break,
            Some(Err(err)) => {
                debug!("Getwork read from {peer} failed: {err}");
                break;
            }
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
        };

        trace!("<<< {text}");

        let work_unit = match decode_submission(&text) {
            Ok(Some(work_unit)) => work_unit,
            Ok(None) => {
                debug!("Message from getwork miner {peer} carries no work");
                continue;
            }
            Err(err) => {
                warn!("Dropping submission from getwork miner {peer}: {err:#}");
                continue;
            }
        };

        let hashed = task::spawn_blocking(move || {
            let share = share(&work_unit, &mut scratch_pad);
            (share, scratch_pad)
        })
        .await;

        let share = match hashed {
            Ok((share, pad)) => {
                scratch_pad = pad;
                share
            }
            Err(err) => {
                error!("Hashing share from getwork miner {peer} failed: {err}");
                break;
            }
        };

        debug!("Share {} from getwork miner {peer}", share.hash);

        if outbound.send(ACCEPTED.into()).await.is_err() {
            break;
        }

        if core.shares.send(share).await.is_err() {
            warn!("Share relay closed, dropping share from {peer}");
        }
    }

    core.sockets.tombstone(id);
    cancel_token.cancel();

    info!("Getwork miner {peer} disconnected");
}
