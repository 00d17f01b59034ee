use super::*;

pub type Result<T = (), E = FrameError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FrameError {
    #[snafu(display("malformed packet `{line}`: missing `~` separator"))]
    Malformed { line: String },

    #[snafu(display("failed to decode `{name}` payload: {source}"))]
    Decode {
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("failed to encode `{name}` payload: {source}"))]
    Encode {
        name: String,
        source: serde_json::Error,
    },
}
