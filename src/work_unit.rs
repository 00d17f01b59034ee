use {super::*, std::ops::Range};

pub const WORK_UNIT_SIZE: usize = 112;
pub const BLOB_SIZE: usize = 96;

const WORKHASH: Range<usize> = 0..32;
const TIMESTAMP: Range<usize> = 32..40;
const NONCE: Range<usize> = 40..48;
const EXTRANONCE: Range<usize> = 48..80;
const PUBLIC_KEY: Range<usize> = 80..112;

/// The 112-byte unit a miner hashes:
/// `workhash[32] | timestamp[8] | nonce[8] | extranonce[32] | public_key[32]`,
/// integers big-endian.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WorkUnit([u8; WORK_UNIT_SIZE]);

impl WorkUnit {
    /// Builds a fresh unit stamped with the current time in milliseconds and a zero nonce.
    pub fn new(workhash: [u8; 32], extranonce: [u8; 32], public_key: [u8; 32]) -> Self {
        let mut unit = Self([0; WORK_UNIT_SIZE]);
        unit.0[WORKHASH].copy_from_slice(&workhash);
        unit.0[PUBLIC_KEY].copy_from_slice(&public_key);
        unit.set_extranonce(extranonce);
        unit.set_timestamp(now_millis());
        unit
    }

    /// Like `new`, but with a fixed timestamp so equal inputs give equal units.
    #[cfg(test)]
    pub(crate) fn fixed(workhash: [u8; 32], extranonce: [u8; 32], public_key: [u8; 32]) -> Self {
        let mut unit = Self::new(workhash, extranonce, public_key);
        unit.set_timestamp(1_700_000_000_000);
        unit
    }

    /// Expands the 96-byte `workhash | extranonce | public_key` form.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        ensure!(
            blob.len() == BLOB_SIZE,
            "malformed work unit blob: expected {BLOB_SIZE} bytes, got {}",
            blob.len()
        );

        Ok(Self::new(
            array(&blob[0..32]),
            array(&blob[32..64]),
            array(&blob[64..96]),
        ))
    }

    /// Accepts either the full unit or its 96-byte blob, as pools send both.
    pub fn from_pool(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            WORK_UNIT_SIZE => Self::try_from(bytes),
            BLOB_SIZE => Self::from_blob(bytes),
            len => bail!(
                "pool work unit must be {WORK_UNIT_SIZE} or {BLOB_SIZE} bytes, got {len}"
            ),
        }
    }

    pub fn workhash(&self) -> [u8; 32] {
        array(&self.0[WORKHASH])
    }

    pub fn timestamp(&self) -> u64 {
        BigEndian::read_u64(&self.0[TIMESTAMP])
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        BigEndian::write_u64(&mut self.0[TIMESTAMP], timestamp);
    }

    pub fn nonce(&self) -> u64 {
        BigEndian::read_u64(&self.0[NONCE])
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        BigEndian::write_u64(&mut self.0[NONCE], nonce);
    }

    pub fn extranonce(&self) -> [u8; 32] {
        array(&self.0[EXTRANONCE])
    }

    pub fn set_extranonce(&mut self, extranonce: [u8; 32]) {
        self.0[EXTRANONCE].copy_from_slice(&extranonce);
    }

    pub fn public_key(&self) -> [u8; 32] {
        array(&self.0[PUBLIC_KEY])
    }

    pub fn blob(&self) -> [u8; BLOB_SIZE] {
        let mut blob = [0; BLOB_SIZE];
        blob[0..32].copy_from_slice(&self.0[WORKHASH]);
        blob[32..64].copy_from_slice(&self.0[EXTRANONCE]);
        blob[64..96].copy_from_slice(&self.0[PUBLIC_KEY]);
        blob
    }

    pub fn as_bytes(&self) -> &[u8; WORK_UNIT_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn fast_hash(&self) -> Hash {
        pow::fast_hash(&self.0)
    }

    pub fn pow_hash(&self, scratch_pad: &mut ScratchPad) -> Hash {
        let mut input = [0; pow::INPUT_SIZE];
        input[..WORK_UNIT_SIZE].copy_from_slice(&self.0);
        pow::hash(&input, scratch_pad)
    }
}

impl Default for WorkUnit {
    fn default() -> Self {
        Self([0; WORK_UNIT_SIZE])
    }
}

impl TryFrom<&[u8]> for WorkUnit {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes = <[u8; WORK_UNIT_SIZE]>::try_from(bytes).map_err(|_| {
            anyhow!(
                "work unit must be {WORK_UNIT_SIZE} bytes, got {}",
                bytes.len()
            )
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "WorkUnit({})", self.to_hex())
    }
}

fn array(slice: &[u8]) -> [u8; 32] {
    let mut array = [0; 32];
    array.copy_from_slice(slice);
    array
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
