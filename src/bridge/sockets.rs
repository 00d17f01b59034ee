use {super::*, parking_lot::RwLock, tokio::sync::mpsc::error::TrySendError};

#[derive(Debug, Clone)]
struct Slot {
    id: u64,
    peer: SocketAddr,
    outbound: mpsc::Sender<String>,
    cancel_token: CancellationToken,
}

/// Live getwork sockets. Entries are emptied in place when a write fails and
/// compacted at the start of the next broadcast.
#[derive(Debug, Clone, Default)]
pub(crate) struct SocketSet(Arc<RwLock<Vec<Option<Slot>>>>);

impl SocketSet {
    pub(crate) fn register(
        &self,
        peer: SocketAddr,
        outbound: mpsc::Sender<String>,
        cancel_token: CancellationToken,
    ) -> u64 {
        let id = rand::rng().next_u64();

        self.0.write().push(Some(Slot {
            id,
            peer,
            outbound,
            cancel_token,
        }));

        id
    }

    /// Empties the slot for `id` and stops its socket. Returns `false` if it
    /// was already gone.
    pub(crate) fn tombstone(&self, id: u64) -> bool {
        let slot = self
            .0
            .write()
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|slot| slot.id == id))
            .and_then(Option::take);

        match slot {
            Some(slot) => {
                slot.cancel_token.cancel();
                debug!("Removed getwork socket {}", slot.peer);
                true
            }
            None => false,
        }
    }

    /// Queues `job` on every socket without waiting. A socket whose queue is
    /// full or closed is tombstoned. Returns how many sockets took the job.
    pub(crate) fn broadcast(&self, job: &Job) -> usize {
        let recipients = {
            let mut slots = self.0.write();
            slots.retain(Option::is_some);
            slots.iter().flatten().cloned().collect::<Vec<Slot>>()
        };

        if recipients.is_empty() {
            return 0;
        }

        debug!("Sending job to {} getwork miners", recipients.len());

        let message = new_job_message(job);
        let mut delivered = 0;

        for slot in recipients {
            match slot.outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Getwork miner {} is not keeping up, disconnecting", slot.peer);
                    self.tombstone(slot.id);
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Failed to send job to getwork miner {}", slot.peer);
                    self.tombstone(slot.id);
                }
            }
        }

        delivered
    }

    pub(crate) fn clear(&self) {
        let slots = std::mem::take(&mut *self.0.write());

        for slot in slots.into_iter().flatten() {
            slot.cancel_token.cancel();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.0.read().iter().flatten().count()
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.0.read().len()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn job() -> Job {
        Job::new(1000, WorkUnit::fixed([1; 32], [2; 32], [3; 32]))
    }

    fn socket(sockets: &SocketSet) -> (u64, mpsc::Receiver<String>, CancellationToken) {
        socket_with_capacity(sockets, 4)
    }

    fn socket_with_capacity(
        sockets: &SocketSet,
        capacity: usize,
    ) -> (u64, mpsc::Receiver<String>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel_token = CancellationToken::new();
        let id = sockets.register("10.0.0.2:5000".parse().unwrap(), tx, cancel_token.clone());
        (id, rx, cancel_token)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_socket() {
        let sockets = SocketSet::default();
        let (_, mut a, _) = socket(&sockets);
        let (_, mut b, _) = socket(&sockets);

        assert_eq!(sockets.broadcast(&job()), 2);

        let expected = new_job_message(&job());
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn tombstone_empties_slot_in_place() {
        let sockets = SocketSet::default();
        let (a, _rx_a, token) = socket(&sockets);
        let (_b, _rx_b, _) = socket(&sockets);

        assert!(sockets.tombstone(a));
        assert!(!sockets.tombstone(a));
        assert!(token.is_cancelled());

        assert_eq!(sockets.len(), 1);
        assert_eq!(sockets.capacity(), 2);

        sockets.broadcast(&job());
        assert_eq!(sockets.capacity(), 1);
    }

    #[tokio::test]
    async fn failed_send_tombstones_socket() {
        let sockets = SocketSet::default();
        let (_, rx, token) = socket(&sockets);
        drop(rx);

        assert_eq!(sockets.broadcast(&job()), 0);
        assert!(token.is_cancelled());
        assert_eq!(sockets.len(), 0);
    }

    #[tokio::test]
    async fn full_queue_tombstones_socket() {
        let sockets = SocketSet::default();
        let (_, mut slow, slow_token) = socket_with_capacity(&sockets, 1);
        let (_, mut fast, _) = socket(&sockets);

        assert_eq!(sockets.broadcast(&job()), 2);
        assert_eq!(sockets.broadcast(&job()), 1);

        assert!(slow_token.is_cancelled());
        assert_eq!(sockets.len(), 1);

        assert_eq!(slow.recv().await.unwrap(), new_job_message(&job()));
        assert_eq!(fast.recv().await.unwrap(), new_job_message(&job()));
        assert_eq!(fast.recv().await.unwrap(), new_job_message(&job()));
    }

    #[tokio::test]
    async fn clear_stops_all_sockets() {
        let sockets = SocketSet::default();
        let (_, _rx_a, a) = socket(&sockets);
        let (_, _rx_b, b) = socket(&sockets);

        sockets.clear();

        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert_eq!(sockets.capacity(), 0);
    }
}
