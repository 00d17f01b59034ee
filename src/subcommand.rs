use super::*;

mod hash;
mod proxy;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Hash a work unit or raw input")]
    Hash(hash::Hash),
    #[command(about = "Run the mining proxy")]
    Proxy(proxy::Proxy),
}

impl Subcommand {
    pub(crate) async fn run(self, settings: Settings, cancel_token: CancellationToken) -> Result {
        match self {
            Self::Hash(hash) => hash.run(),
            Self::Proxy(proxy) => proxy.run(settings, cancel_token).await,
        }
    }
}
