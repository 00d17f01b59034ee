use super::*;

/// Lifecycle of the pool connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum State {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Dial,
    Connected,
    Handshaken,
    Failed,
}

impl State {
    /// The single transition table. Any failure returns to `Disconnected`;
    /// out-of-order events leave the state unchanged.
    pub fn next(self, transition: Transition) -> Self {
        match (self, transition) {
            (_, Transition::Failed) => Self::Disconnected,
            (Self::Disconnected, Transition::Dial) => Self::Connecting,
            (Self::Connecting, Transition::Connected) => Self::Handshaking,
            (Self::Handshaking, Transition::Handshaken) => Self::Active,
            (state, _) => state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn should_retry(&self, attempts: u64) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn happy_path() {
        let state = State::default()
            .next(Transition::Dial)
            .next(Transition::Connected)
            .next(Transition::Handshaken);

        assert_eq!(state, State::Active);
    }

    #[test]
    fn failure_from_any_state_disconnects() {
        for state in [
            State::Disconnected,
            State::Connecting,
            State::Handshaking,
            State::Active,
        ] {
            assert_eq!(state.next(Transition::Failed), State::Disconnected);
        }
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        assert_eq!(
            State::Disconnected.next(Transition::Handshaken),
            State::Disconnected
        );
        assert_eq!(State::Connecting.next(Transition::Dial), State::Connecting);
        assert_eq!(State::Active.next(Transition::Connected), State::Active);
    }

    #[test]
    fn default_policy_retries_forever_every_second() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff, Duration::from_secs(1));
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(u64::MAX));
    }

    #[test]
    fn bounded_policy_stops() {
        let policy = ReconnectPolicy {
            max_attempts: Some(3),
            ..Default::default()
        };
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn states_display() {
        assert_eq!(State::Handshaking.to_string(), "Handshaking");
    }
}
