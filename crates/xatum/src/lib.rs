use {
    base64::{Engine, engine::general_purpose::STANDARD},
    derive_more::Display,
    error::{FrameError, Result},
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, DeserializeOwned, Deserializer},
    },
    snafu::{ResultExt, Snafu},
    std::{
        fmt::{self, Formatter},
        str::FromStr,
    },
};

mod blob;
#[cfg(feature = "client")]
mod client;
mod error;
mod handshake;
mod job;
mod packet;
mod print;
mod submit;
mod success;

pub use {
    blob::Blob,
    error::FrameError as Error,
    handshake::Handshake,
    job::Job,
    packet::{Empty, Frame, HANDSHAKE, JOB, PING, PONG, PRINT, SUBMIT, SUCCESS},
    print::{Print, PrintLevel},
    submit::Submit,
    success::Success,
};

#[cfg(feature = "client")]
pub use client::{Client, ClientConfig, ClientError, Events};
