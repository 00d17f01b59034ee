use {super::*, parking_lot::RwLock};

/// The pool's latest work, replaced wholesale on every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub difficulty: u64,
    pub work_unit: WorkUnit,
    pub target: U256,
}

impl Job {
    pub fn new(difficulty: u64, work_unit: WorkUnit) -> Self {
        Self {
            difficulty,
            work_unit,
            target: target(difficulty),
        }
    }

    pub fn from_pool(job: &xatum::Job) -> Result<Self> {
        Ok(Self::new(
            job.diff,
            WorkUnit::from_pool(job.blob.as_bytes()).context("invalid job from pool")?,
        ))
    }

    pub fn to_pool_job(&self) -> xatum::Job {
        xatum::Job {
            diff: self.difficulty,
            blob: self.work_unit.as_bytes().as_slice().into(),
        }
    }
}

/// Single slot holding the current job. Readers get a copy, never a reference
/// into the slot.
#[derive(Debug, Default)]
pub struct JobSlot(RwLock<Option<Job>>);

impl JobSlot {
    /// The current job, or `None` while there is no work. A zero difficulty
    /// counts as no work.
    pub fn current(&self) -> Option<Job> {
        let job = *self.0.read();
        job.filter(|job| job.difficulty > 0)
    }

    /// Runs `f` with the current job while replacements wait, so whatever `f`
    /// queues lands ahead of the next job's fan-out.
    pub fn with_current<T>(&self, f: impl FnOnce(Option<Job>) -> T) -> T {
        let slot = self.0.read();
        f((*slot).filter(|job| job.difficulty > 0))
    }

    pub fn replace(&self, job: Job) -> Option<Job> {
        self.0.write().replace(job)
    }
}

/// What a single miner was last sent, and the nonces it has submitted against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnJob {
    pub difficulty: u64,
    pub work_unit: WorkUnit,
    pub submitted_nonces: Vec<u64>,
}

impl ConnJob {
    pub fn new(difficulty: u64, work_unit: WorkUnit) -> Self {
        Self {
            difficulty,
            work_unit,
            submitted_nonces: Vec::with_capacity(8),
        }
    }

    pub fn matches(&self, unit: &WorkUnit) -> bool {
        validate_extranonces(&self.work_unit.extranonce(), &unit.extranonce())
    }

    /// Records `nonce`, returning `false` if it was already submitted.
    pub fn record(&mut self, nonce: u64) -> bool {
        if self.submitted_nonces.contains(&nonce) {
            return false;
        }

        self.submitted_nonces.push(nonce);
        true
    }
}
