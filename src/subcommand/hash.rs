use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Hash {
    #[arg(help = "Hash <INPUT>, a hex work unit or up to 200 bytes of raw hex input.")]
    input: String,
    #[arg(long, help = "Check the proof-of-work digest against <DIFFICULTY>.")]
    difficulty: Option<u64>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub input: String,
    pub work_unit: bool,
    pub pow_hash: String,
    pub fast_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meets_difficulty: Option<bool>,
}

impl Hash {
    pub(crate) fn run(self) -> Result {
        let output = self.output()?;
        serde_json::to_writer_pretty(io::stdout(), &output)?;
        println!();
        Ok(())
    }

    fn output(&self) -> Result<Output> {
        let bytes = hex::decode(self.input.trim()).context("input is not valid hex")?;

        let mut scratch_pad = ScratchPad::new();

        let (pow_hash, fast_hash) = if bytes.len() == WORK_UNIT_SIZE {
            let work_unit = WorkUnit::try_from(bytes.as_slice())?;
            (work_unit.pow_hash(&mut scratch_pad), work_unit.fast_hash())
        } else {
            (
                pow::pow_hash(&bytes, &mut scratch_pad)?,
                pow::fast_hash(&bytes),
            )
        };

        Ok(Output {
            input: hex::encode(&bytes),
            work_unit: bytes.len() == WORK_UNIT_SIZE,
            pow_hash: hex::encode(pow_hash),
            fast_hash: hex::encode(fast_hash),
            meets_difficulty: self
                .difficulty
                .map(|difficulty| check_diff(&pow_hash, difficulty)),
        })
    }
}
