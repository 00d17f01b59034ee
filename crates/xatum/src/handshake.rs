use super::*;

/// First packet on every xatum connection, sent by the mining side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Handshake {
    #[serde(rename = "addr")]
    pub address: String,
    #[serde(rename = "work")]
    pub worker: String,
    pub agent: String,
    #[serde(rename = "algos")]
    pub algorithms: Vec<String>,
}

impl Handshake {
    pub fn supports(&self, algorithm: &str) -> bool {
        self.algorithms.iter().any(|supported| supported == algorithm)
    }
}
