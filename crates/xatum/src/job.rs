use super::*;

/// Work issued by the pool: a difficulty and the work unit to hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub diff: u64,
    pub blob: Blob,
}
