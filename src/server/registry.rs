use {super::*, tokio::sync::RwLock};

/// Live Xatum connections and the per-IP counters behind admission control.
pub(crate) struct Registry {
    max_per_ip: u32,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    connections: Vec<Arc<Connection>>,
    per_ip: HashMap<IpAddr, u32>,
}

impl Registry {
    pub(crate) fn new(max_per_ip: u32) -> Self {
        Self {
            max_per_ip,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Whether `ip` already holds more connections than allowed.
    pub(crate) async fn is_full(&self, ip: IpAddr) -> bool {
        self.inner
            .read()
            .await
            .per_ip
            .get(&ip)
            .is_some_and(|count| *count > self.max_per_ip)
    }

    /// Registers `connection` unless its IP is over the limit.
    pub(crate) async fn admit(&self, connection: Arc<Connection>) -> bool {
        let mut inner = self.inner.write().await;

        let count = inner.per_ip.entry(connection.peer.ip()).or_default();

        if *count > self.max_per_ip {
            return false;
        }

        *count += 1;
        inner.connections.push(connection);

        true
    }

    /// Removes and closes the connection. Kicking an unknown id is a no-op.
    pub(crate) async fn kick(&self, id: u64) -> bool {
        let connection = {
            let mut inner = self.inner.write().await;

            let Some(position) = inner.connections.iter().position(|c| c.id == id) else {
                return false;
            };

            let connection = inner.connections.remove(position);
            let ip = connection.peer.ip();

            let count = inner.per_ip.get(&ip).copied();

            match count {
                Some(count) if count > 1 => {
                    inner.per_ip.insert(ip, count - 1);
                }
                _ => {
                    inner.per_ip.remove(&ip);
                }
            }

            connection
        };

        debug!("Kicked miner {} ({:016x})", connection.peer, connection.id);

        connection.close().await;

        true
    }

    /// Sends `job` to every handshaken miner in parallel and kicks those that fail.
    pub(crate) async fn broadcast(&self, job: &Job) {
        let recipients = self
            .inner
            .read()
            .await
            .connections
            .iter()
            .filter(|connection| connection.is_active())
            .cloned()
            .collect::<Vec<_>>();

        if recipients.is_empty() {
            return;
        }

        debug!("Sending job to {} Xatum miners", recipients.len());

        let mut sends = JoinSet::new();

        for connection in recipients {
            let job = *job;
            sends.spawn(async move {
                connection
                    .send_job(&job)
                    .await
                    .map_err(|kick| (connection, kick))
            });
        }

        while let Some(result) = sends.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err((connection, kick))) => {
                    warn!("Failed to send job to {}: {kick}", connection.peer);
                    self.kick(connection.id).await;
                }
                Err(err) => error!("Job fan-out task failed: {err}"),
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    #[cfg(test)]
    pub(crate) async fn active(&self) -> usize {
        self.inner
            .read()
            .await
            .connections
            .iter()
            .filter(|connection| connection.is_active())
            .count()
    }

    pub(crate) async fn connections_from(&self, ip: IpAddr) -> u32 {
        self.inner
            .read()
            .await
            .per_ip
            .get(&ip)
            .copied()
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) async fn first(&self) -> Option<Arc<Connection>> {
        self.inner.read().await.connections.first().cloned()
    }

    pub(crate) async fn shutdown(&self) {
        let connections = {
            let mut inner = self.inner.write().await;
            inner.per_ip.clear();
            std::mem::take(&mut inner.connections)
        };

        if !connections.is_empty() {
            info!("Disconnecting {} Xatum miners", connections.len());
        }

        for connection in connections {
            connection.close().await;
        }
    }
}
