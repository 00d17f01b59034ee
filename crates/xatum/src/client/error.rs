use {
    super::*,
    rustls::pki_types::InvalidDnsNameError,
    tokio::time::error::Elapsed,
    tokio_util::codec::LinesCodecError,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display("Connection timeout: {source}"))]
    Timeout { source: Elapsed },

    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("TLS handshake failed: {source}"))]
    Tls { source: std::io::Error },

    #[snafu(display("TLS configuration error: {source}"))]
    TlsConfig { source: rustls::Error },

    #[snafu(display("Invalid pool host `{host}`: {source}"))]
    ServerName {
        host: String,
        source: InvalidDnsNameError,
    },

    #[snafu(display("Codec error: {source}"))]
    Codec { source: LinesCodecError },

    #[snafu(display("{source}"))]
    Frame { source: FrameError },

    #[snafu(display("No data from pool within {}s", timeout.as_secs()))]
    ReadTimeout { timeout: Duration },

    #[snafu(display("No write to pool completed within {}s", timeout.as_secs()))]
    WriteTimeout { timeout: Duration, source: Elapsed },

    #[snafu(display("No jobs received in the last {}s", elapsed.as_secs()))]
    Stale { elapsed: Duration },

    #[snafu(display("Result stream closed by consumer"))]
    StreamClosed,

    #[snafu(display("Not connected"))]
    NotConnected,
}
