use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PrintLevel {
    #[display("verbose")]
    Verbose,
    #[display("info")]
    Info,
    #[display("warn")]
    Warn,
    #[display("error")]
    Error,
}

/// Operator-visible message, either from the pool to the proxy or from the
/// proxy to a miner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Print {
    pub msg: String,
    pub lvl: u8,
}

impl Print {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            lvl: 3,
        }
    }

    /// `None` for levels outside 0..=3.
    pub fn level(&self) -> Option<PrintLevel> {
        match self.lvl {
            0 => Some(PrintLevel::Verbose),
            1 => Some(PrintLevel::Info),
            2 => Some(PrintLevel::Warn),
            3 => Some(PrintLevel::Error),
            _ => None,
        }
    }
}
