use super::*;

pub(crate) type FanoutReceiver = mpsc::UnboundedReceiver<Job>;

/// State shared by every task: the job slot, both miner sets, and the share relay.
pub(crate) struct ProxyCore {
    pub(crate) jobs: JobSlot,
    pub(crate) miners: Registry,
    pub(crate) sockets: SocketSet,
    pub(crate) shares: ShareSender,
    fanout: mpsc::UnboundedSender<Job>,
}

impl ProxyCore {
    pub(crate) fn new(settings: &Settings, shares: ShareSender) -> (Arc<Self>, FanoutReceiver) {
        Self::with_limit(settings.max_connections_per_ip(), shares)
    }

    fn with_limit(max_per_ip: u32, shares: ShareSender) -> (Arc<Self>, FanoutReceiver) {
        let (fanout, jobs) = mpsc::unbounded_channel();

        (
            Arc::new(Self {
                jobs: JobSlot::default(),
                miners: Registry::new(max_per_ip),
                sockets: SocketSet::default(),
                shares,
                fanout,
            }),
            jobs,
        )
    }

    /// Stores `job` as current and queues it for delivery to both protocols.
    pub(crate) fn publish(&self, job: Job) {
        self.jobs.replace(job);

        if self.fanout.send(job).is_err() {
            warn!("Job fan-out stopped, difficulty {} not delivered", job.difficulty);
        }
    }

    /// Delivers published jobs one at a time, so every miner sees them in
    /// publication order.
    pub(crate) fn spawn_fanout(
        self: &Arc<Self>,
        jobs: FanoutReceiver,
        cancel_token: CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        let core = self.clone();
        tasks.spawn(async move { core.fanout(jobs, cancel_token).await });
    }

    async fn fanout(&self, mut jobs: FanoutReceiver, cancel_token: CancellationToken) {
        loop {
            let job = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.sockets.broadcast(&job);
            self.miners.broadcast(&job).await;
        }

        debug!("Job fan-out stopped");
    }

    pub(crate) async fn shutdown(&self) {
        self.miners.shutdown().await;
        self.sockets.clear();
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> (Arc<Self>, ShareReceiver) {
        Self::for_tests_with_limit(100)
    }

    #[cfg(test)]
    pub(crate) fn for_tests_with_limit(max_per_ip: u32) -> (Arc<Self>, ShareReceiver) {
        let (shares, rx) = relay::channel();
        let (core, jobs) = Self::with_limit(max_per_ip, shares);

        let fanout = core.clone();
        tokio::spawn(async move { fanout.fanout(jobs, CancellationToken::new()).await });

        (core, rx)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn job(difficulty: u64) -> Job {
        Job::new(difficulty, WorkUnit::fixed([1; 32], [2; 32], [3; 32]))
    }

    #[tokio::test]
    async fn publish_replaces_current_job() {
        let (core, _shares) = ProxyCore::for_tests();

        assert!(core.jobs.current().is_none());

        core.publish(job(5));
        assert_eq!(core.jobs.current().unwrap().difficulty, 5);

        core.publish(job(6));
        assert_eq!(core.jobs.current().unwrap().difficulty, 6);
    }

    #[tokio::test]
    async fn back_to_back_jobs_arrive_in_order() {
        let (core, _shares) = ProxyCore::for_tests();

        let (outbound, mut pending) = mpsc::channel(8);
        core.sockets.register(
            "10.0.0.4:7000".parse().unwrap(),
            outbound,
            CancellationToken::new(),
        );

        for difficulty in 1..=5 {
            core.publish(job(difficulty));
        }

        for difficulty in 1..=5 {
            let message = timeout(Duration::from_secs(5), pending.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(message, bridge::new_job_message(&job(difficulty)));
        }
    }

    #[tokio::test]
    async fn fanout_stops_on_cancel() {
        let (shares, _rx) = relay::channel();
        let (core, jobs) = ProxyCore::with_limit(1, shares);

        let cancel_token = CancellationToken::new();
        let mut tasks = JoinSet::new();
        core.spawn_fanout(jobs, cancel_token.clone(), &mut tasks);

        cancel_token.cancel();

        timeout(Duration::from_secs(5), tasks.join_next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
