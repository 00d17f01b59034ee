//! The memory-hard proof-of-work hash, and the fast identity hash.
//!
//! The proof-of-work runs in three stages over a 256 KiB scratchpad:
//! a 12-round Keccak-p[1600] fill with branching, a slot shuffle over the
//! pad viewed as `u32`, and 5000 rounds of AES and branching arithmetic.

use {
    super::*,
    aes::{Block, hazmat::cipher_round},
    byteorder::LittleEndian,
    std::ops::Range,
};

pub const HASH_SIZE: usize = 32;
pub const INPUT_SIZE: usize = KECCAK_WORDS * 8;

const MEMORY_SIZE: usize = 32768;
const SCRATCHPAD_ITERS: usize = 5000;
const ITERS: usize = 1;
const BUFFER_SIZE: usize = 42;
const SLOT_LENGTH: usize = 256;
const KECCAK_WORDS: usize = 25;
const KECCAK_ROUNDS: usize = 12;
const STAGE_1_MAX: usize = MEMORY_SIZE / KECCAK_WORDS;

pub type Hash = [u8; HASH_SIZE];

/// Working memory for one hash at a time. Reuse it between calls, never share
/// it between concurrent callers.
pub struct ScratchPad(Box<[u64]>);

impl ScratchPad {
    pub fn new() -> Self {
        Self(vec![0; MEMORY_SIZE].into_boxed_slice())
    }
}

impl Default for ScratchPad {
    fn default() -> Self {
        Self::new()
    }
}

pub fn fast_hash(data: &[u8]) -> Hash {
    blake3::hash(data).into()
}

/// Hashes up to [`INPUT_SIZE`] bytes, zero-padded.
pub fn pow_hash(data: &[u8], scratch_pad: &mut ScratchPad) -> Result<Hash> {
    ensure!(
        data.len() <= INPUT_SIZE,
        "proof-of-work input is {} bytes, at most {INPUT_SIZE} allowed",
        data.len()
    );

    let mut input = [0; INPUT_SIZE];
    input[..data.len()].copy_from_slice(data);

    Ok(hash(&input, scratch_pad))
}

pub(crate) fn hash(input: &[u8; INPUT_SIZE], scratch_pad: &mut ScratchPad) -> Hash {
    let mut state = [0u64; KECCAK_WORDS];
    for (word, chunk) in state.iter_mut().zip(input.chunks_exact(8)) {
        *word = LittleEndian::read_u64(chunk);
    }

    let pad = &mut scratch_pad.0[..];

    stage_1(&mut state, pad, 0..STAGE_1_MAX, 0..KECCAK_WORDS);
    stage_1(
        &mut state,
        pad,
        STAGE_1_MAX..STAGE_1_MAX + 1,
        0..MEMORY_SIZE - STAGE_1_MAX * KECCAK_WORDS,
    );
    stage_2(pad);
    stage_3(pad)
}

fn stage_1(
    state: &mut [u64; KECCAK_WORDS],
    pad: &mut [u64],
    rows: Range<usize>,
    words: Range<usize>,
) {
    for i in rows {
        keccak::p1600(state, KECCAK_ROUNDS);

        let mut rand_int = 0u64;

        for j in words.clone() {
            let left = state[(j + 1) % KECCAK_WORDS];
            let right = state[(j + 2) % KECCAK_WORDS];
            let xor = left ^ right;

            let v = match xor & 0x3 {
                0 => left & right,
                1 => !(left & right),
                2 => !xor,
                _ => xor,
            };

            rand_int = state[j] ^ rand_int ^ v;
            pad[i * KECCAK_WORDS + j] = rand_int;
        }
    }
}

fn stage_2(pad: &mut [u64]) {
    let small_pad: &mut [u32] = bytemuck::cast_slice_mut(pad);
    let tail = small_pad.len() - SLOT_LENGTH;

    let mut slots = [0u32; SLOT_LENGTH];
    slots.copy_from_slice(&small_pad[tail..]);

    let mut indices = [0u16; SLOT_LENGTH];

    for _ in 0..ITERS {
        for chunk in small_pad.chunks_exact(SLOT_LENGTH) {
            for (k, index) in indices.iter_mut().enumerate() {
                *index = k as u16;
            }

            for slot_idx in (0..SLOT_LENGTH).rev() {
                let index_in_indices = (chunk[slot_idx] % (slot_idx as u32 + 1)) as usize;
                let index = indices[index_in_indices] as usize;
                indices[index_in_indices] = indices[slot_idx];

                let mut sum = slots[index];

                for (k, &value) in chunk.iter().enumerate() {
                    if k == index {
                        continue;
                    }

                    sum = if slots[k] >> 31 == 0 {
                        sum.wrapping_add(value)
                    } else {
                        sum.wrapping_sub(value)
                    };
                }

                slots[index] = sum;
            }
        }
    }

    small_pad[tail..].copy_from_slice(&slots);
}

fn stage_3(pad: &mut [u64]) -> Hash {
    let last = pad[MEMORY_SIZE - 1];
    let start_a = ((last >> 15) & 0x7FFF) as usize;
    let start_b = (last & 0x7FFF) as usize;

    let mut mem_buffer_a = [0u64; BUFFER_SIZE];
    let mut mem_buffer_b = [0u64; BUFFER_SIZE];

    for i in 0..BUFFER_SIZE {
        mem_buffer_a[i] = pad[(start_a + i) % MEMORY_SIZE];
        mem_buffer_b[i] = pad[(start_b + i) % MEMORY_SIZE];
    }

    let key = Block::default();
    let mut output = [0; HASH_SIZE];

    for i in 0..SCRATCHPAD_ITERS {
        let mem_a = mem_buffer_a[i % BUFFER_SIZE];
        let mem_b = mem_buffer_b[i % BUFFER_SIZE];

        let mut block = Block::default();
        block[..8].copy_from_slice(&mem_b.to_le_bytes());
        block[8..].copy_from_slice(&mem_a.to_le_bytes());

        cipher_round(&mut block, &key);

        let hash1 = LittleEndian::read_u64(&block[..8]);
        let mut result = !(hash1 ^ mem_a ^ mem_b);

        for j in 0..HASH_SIZE {
            let a = mem_buffer_a[(j + i) % BUFFER_SIZE];
            let b = mem_buffer_b[(j + i) % BUFFER_SIZE];

            result = match (result >> (j * 2)) & 0xf {
                0 => result.rotate_left(j as u32) ^ b,
                1 => !(result.rotate_left(j as u32) ^ a),
                2 => !(result ^ a),
                3 => result ^ b,
                4 => result ^ a.wrapping_add(b),
                5 => result ^ a.wrapping_sub(b),
                6 => result ^ b.wrapping_sub(a),
                7 => result ^ a.wrapping_mul(b),
                8 => result ^ (a & b),
                9 => result ^ (a | b),
                10 => result ^ (a ^ b),
                11 => result ^ a.wrapping_sub(result),
                12 => result ^ b.wrapping_sub(result),
                13 => result ^ a.wrapping_add(result),
                14 => result ^ result.wrapping_sub(a),
                _ => result ^ result.wrapping_sub(b),
            };
        }

        let addr_b = (result & 0x7FFF) as usize;
        mem_buffer_a[i % BUFFER_SIZE] = result;
        mem_buffer_b[i % BUFFER_SIZE] = pad[addr_b];

        let addr_a = ((result >> 15) & 0x7FFF) as usize;
        pad[addr_a] = result;

        let index = SCRATCHPAD_ITERS - i - 1;
        if index < 4 {
            output[index * 8..(index + 1) * 8].copy_from_slice(&result.to_be_bytes());
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    const ZERO_INPUT_HASH: Hash = [
        0x0e, 0xbb, 0xbd, 0x8a, 0x31, 0xed, 0xad, 0xfe, 0x09, 0x8f, 0x2d, 0x77, 0x0d, 0x84, 0xb7,
        0x19, 0x58, 0x86, 0x75, 0xab, 0x88, 0xa0, 0xa1, 0x70, 0x67, 0xd0, 0x0a, 0x8f, 0x36, 0x18,
        0x22, 0x65,
    ];

    #[test]
    fn zero_input() {
        let mut scratch_pad = ScratchPad::new();
        assert_eq!(
            pow_hash(&[0; INPUT_SIZE], &mut scratch_pad).unwrap(),
            ZERO_INPUT_HASH
        );
    }

    #[test]
    fn text_input() {
        let mut scratch_pad = ScratchPad::new();
        assert_eq!(
            pow_hash(b"xelis-hashing-algorithm", &mut scratch_pad).unwrap(),
            [
                106, 106, 173, 8, 207, 59, 118, 108, 176, 196, 9, 124, 250, 195, 3, 61, 30, 146,
                238, 182, 88, 83, 115, 81, 139, 56, 3, 28, 176, 86, 68, 21
            ]
        );
    }

    #[test]
    fn scratch_pad_is_reusable() {
        let mut scratch_pad = ScratchPad::new();

        let first = pow_hash(b"xelis-hashing-algorithm", &mut scratch_pad).unwrap();
        assert_eq!(pow_hash(&[], &mut scratch_pad).unwrap(), ZERO_INPUT_HASH);
        assert_eq!(
            pow_hash(b"xelis-hashing-algorithm", &mut scratch_pad).unwrap(),
            first
        );
    }

    #[test]
    fn oversized_input_is_rejected() {
        let mut scratch_pad = ScratchPad::new();
        assert!(pow_hash(&[0; INPUT_SIZE + 1], &mut scratch_pad).is_err());
    }

    #[test]
    fn fast_hash_is_blake3() {
        assert_eq!(
            hex::encode(fast_hash(b"")),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }
}
