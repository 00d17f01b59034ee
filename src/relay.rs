use super::*;

/// One pending share at a time. Producers wait while the slot is full, so a
/// share waits behind at most one in-flight pool write before it is accepted.
pub(crate) const RELAY_CAPACITY: usize = 1;

pub(crate) type ShareSender = mpsc::Sender<Submit>;
pub(crate) type ShareReceiver = mpsc::Receiver<Submit>;

pub(crate) fn channel() -> (ShareSender, ShareReceiver) {
    mpsc::channel(RELAY_CAPACITY)
}

pub(crate) fn spawn(
    upstream: Arc<Upstream>,
    shares: ShareReceiver,
    cancel_token: CancellationToken,
    tasks: &mut JoinSet<()>,
) {
    tasks.spawn(async move { run(&upstream, shares, cancel_token).await });
}

async fn run(upstream: &Upstream, mut shares: ShareReceiver, cancel_token: CancellationToken) {
    loop {
        let share = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            share = shares.recv() => match share {
                Some(share) => share,
                None => break,
            },
        };

        forward(upstream, &share).await;
    }

    debug!("Share relay stopped");
}

/// Sends one share to the pool. Failures are final; the share is never requeued.
async fn forward(upstream: &Upstream, share: &Submit) -> bool {
    let Some(client) = upstream.client() else {
        warn!(
            "Dropping share {}: pool session is {}",
            share.hash,
            upstream.state()
        );
        return false;
    };

    match client.submit(share).await {
        Ok(()) => {
            info!("Relayed share {} to pool", share.hash);
            true
        }
        Err(err) => {
            warn!("Failed to relay share {}: {err}", share.hash);
            false
        }
    }
}
