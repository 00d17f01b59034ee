use {
    super::*,
    tracing_appender::{non_blocking, non_blocking::WorkerGuard},
    tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt},
};

pub(crate) fn logs_enabled() -> bool {
    env::var_os("RUST_LOG").is_some()
}

/// `RUST_LOG` wins over `debug`. The returned guard flushes on drop.
pub(crate) fn init(debug: bool) -> WorkerGuard {
    let (writer, guard) = non_blocking(io::stderr());

    let filter = if logs_enabled() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_directive(debug))
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(writer)
                .with_filter(filter),
        )
        .try_init()
    {
        eprintln!("failed to initialize logging: {err}");
    }

    guard
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "warn,xelproxy=debug,xatum=debug"
    } else {
        "warn,xelproxy=info,xatum=info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_raises_own_crates_only() {
        assert_eq!(default_directive(false), "warn,xelproxy=info,xatum=info");
        assert_eq!(default_directive(true), "warn,xelproxy=debug,xatum=debug");
    }
}
