use {super::*, tokio_rustls::TlsAcceptor};

pub(crate) use {
    connection::{Connection, Kick},
    registry::Registry,
};

mod connection;
mod registry;
mod tls;

/// Binds the Xatum listener and spawns its accept loop.
pub(crate) async fn spawn(
    settings: &Settings,
    core: Arc<ProxyCore>,
    cancel_token: CancellationToken,
    tasks: &mut JoinSet<()>,
) -> Result {
    let acceptor = tls::acceptor(settings.cert(), settings.key())?;

    let address = settings.address();
    let port = settings.xatum_port();

    let listener = TcpListener::bind((address, port))
        .await
        .with_context(|| format!("failed to bind Xatum server to {address}:{port}"))?;

    info!("Xatum server listening on {address}:{port}");

    let miner_timeout = settings.miner_timeout();

    tasks.spawn(async move {
        accept(listener, acceptor, core, miner_timeout, cancel_token).await;
    });

    Ok(())
}

async fn accept(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    core: Arc<ProxyCore>,
    miner_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("Failed to accept Xatum connection: {err}");
                        continue;
                    }
                };

                if core.miners.is_full(peer.ip()).await {
                    debug!(
                        "Rejecting {peer}: {} connections already open from this IP",
                        core.miners.connections_from(peer.ip()).await
                    );
                    continue;
                }

                debug!("New incoming Xatum connection from {peer}");

                let acceptor = acceptor.clone();
                let core = core.clone();
                let cancel_token = cancel_token.child_token();

                connections.spawn(async move {
                    let stream = match timeout(WRITE_TIMEOUT, acceptor.accept(stream)).await {
                        Ok(Ok(stream)) => stream,
                        Ok(Err(err)) => {
                            debug!("TLS handshake with {peer} failed: {err}");
                            return;
                        }
                        Err(_) => {
                            debug!("TLS handshake with {peer} timed out");
                            return;
                        }
                    };

                    connection::serve(core, stream, peer, miner_timeout, cancel_token).await;
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    info!("Xatum server stopped, waiting for {} miners", connections.len());

    while connections.join_next().await.is_some() {}
}
