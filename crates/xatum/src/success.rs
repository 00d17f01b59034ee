use super::*;

/// Share acknowledgement from the pool. `msg` is `ok` on acceptance and the
/// rejection reason otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Success {
    pub msg: String,
}

impl Success {
    pub fn is_accepted(&self) -> bool {
        self.msg == "ok"
    }
}
