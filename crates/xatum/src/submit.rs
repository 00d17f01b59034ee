use super::*;

/// A share: the solved work unit and its proof-of-work digest as hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submit {
    pub data: Blob,
    pub hash: String,
}
