use super::*;

pub const EXTRANONCE_SIZE: usize = 32;

/// Bytes of extranonce owned by the pool. The remainder is randomized per delivery.
pub const EXTRANONCE_PREFIX_SIZE: usize = 28;

/// Returns a copy of `unit` whose extranonce suffix is replaced with fresh
/// random bytes, giving each delivery its own slice of the search space.
pub fn partition(unit: &WorkUnit) -> WorkUnit {
    let mut extranonce = unit.extranonce();
    rand::rng().fill_bytes(&mut extranonce[EXTRANONCE_PREFIX_SIZE..]);

    let mut unit = *unit;
    unit.set_extranonce(extranonce);
    unit
}

/// True when both extranonces carry the same pool-issued prefix.
pub fn validate_extranonces(a: &[u8; EXTRANONCE_SIZE], b: &[u8; EXTRANONCE_SIZE]) -> bool {
    a[..EXTRANONCE_PREFIX_SIZE] == b[..EXTRANONCE_PREFIX_SIZE]
}
