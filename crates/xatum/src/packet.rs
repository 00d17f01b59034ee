use super::*;

pub const HANDSHAKE: &str = "shake";
pub const JOB: &str = "job";
pub const SUBMIT: &str = "submit";
pub const SUCCESS: &str = "success";
pub const PRINT: &str = "print";
pub const PING: &str = "ping";
pub const PONG: &str = "pong";

/// Payload of `ping` and `pong`, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// One line of the xatum wire protocol: `<name>~<json>`.
///
/// The trailing newline is owned by the line codec and never part of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{name}~{payload}")]
pub struct Frame {
    pub name: String,
    pub payload: String,
}

impl Frame {
    pub fn new(name: &str, payload: &impl Serialize) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            payload: serde_json::to_string(payload).context(error::EncodeSnafu { name })?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.payload).context(error::DecodeSnafu {
            name: self.name.as_str(),
        })
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl FromStr for Frame {
    type Err = FrameError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let Some((name, payload)) = line.split_once('~') else {
            return error::MalformedSnafu { line }.fail();
        };

        Ok(Self {
            name: name.into(),
            payload: payload.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn parse_splits_on_first_separator() {
        let frame = "print~{\"msg\":\"a~b\",\"lvl\":1}".parse::<Frame>().unwrap();
        assert_eq!(frame.name, PRINT);
        assert_eq!(frame.payload, "{\"msg\":\"a~b\",\"lvl\":1}");
    }

    #[test]
    fn parse_strips_line_terminators() {
        let frame = "ping~{}\r\n".parse::<Frame>().unwrap();
        assert_eq!(frame.name, PING);
        assert_eq!(frame.decode::<Empty>().unwrap(), Empty {});
    }

    #[test]
    fn parse_rejects_missing_separator() {
        let err = "shake".parse::<Frame>().unwrap_err();
        assert!(matches!(err, FrameError::Malformed { .. }));
        assert!(err.to_string().contains("missing `~`"));
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(Frame::new(PONG, &Empty {}).unwrap().to_string(), "pong~{}");
    }

    #[test]
    fn decode_error_names_packet() {
        let frame = "job~{\"diff\":\"nope\"}".parse::<Frame>().unwrap();
        let err = frame.decode::<Job>().unwrap_err();
        assert!(err.to_string().starts_with("failed to decode `job` payload"));
    }
}
