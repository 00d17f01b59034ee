use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Proxy {}

impl Proxy {
    pub(crate) async fn run(self, settings: Settings, cancel_token: CancellationToken) -> Result {
        let upstream = Arc::new(Upstream::new(&settings)?);

        let (shares, share_rx) = relay::channel();
        let (core, jobs) = ProxyCore::new(&settings, shares);

        let mut tasks = JoinSet::new();

        core.spawn_fanout(jobs, cancel_token.clone(), &mut tasks);

        server::spawn(&settings, core.clone(), cancel_token.clone(), &mut tasks)
            .await
            .context("failed to start Xatum server")?;

        bridge::spawn(&settings, core.clone(), cancel_token.clone(), &mut tasks)
            .context("failed to start getwork server")?;

        relay::spawn(upstream.clone(), share_rx, cancel_token.clone(), &mut tasks);

        upstream.spawn(core.clone(), cancel_token.clone(), &mut tasks);

        cancel_token.cancelled().await;

        info!("Shutting down");

        core.shutdown().await;

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                error!("Task failed during shutdown: {err}");
            }
        }

        Ok(())
    }
}
