use super::*;

/// `floor(2^256 - 1 / difficulty)`, or zero when there is no difficulty.
pub fn target(difficulty: u64) -> U256 {
    if difficulty == 0 {
        return U256::zero();
    }

    U256::MAX / U256::from(difficulty)
}

/// Whether `hash`, read as a big-endian integer, is strictly below the target for `difficulty`.
pub fn check_diff(hash: &Hash, difficulty: u64) -> bool {
    U256::from_big_endian(hash) < target(difficulty)
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn difficulty_one_is_max() {
        assert_eq!(target(1), U256::MAX);
    }

    #[test]
    fn zero_difficulty_has_zero_target() {
        assert_eq!(target(0), U256::zero());
        assert!(!check_diff(&[0; 32], 0));
    }

    #[test]
    fn target_is_floor_division() {
        assert_eq!(target(2), U256::MAX >> 1);
        assert_eq!(
            target(1000) * U256::from(1000u64),
            U256::MAX - U256::MAX % U256::from(1000u64)
        );
    }

    #[test]
    fn target_is_monotonic() {
        let mut previous = target(1);

        for difficulty in [2, 3, 10, 1000, 1 << 20, 1 << 40, u64::MAX] {
            let current = target(difficulty);
            assert!(current <= previous, "target({difficulty}) increased");
            previous = current;
        }
    }

    #[test]
    fn hash_equal_to_target_is_rejected() {
        let boundary = target(1000);

        assert!(!check_diff(&boundary.to_big_endian(), 1000));
        assert!(check_diff(&(boundary - U256::one()).to_big_endian(), 1000));
        assert!(!check_diff(&(boundary + U256::one()).to_big_endian(), 1000));
    }

    #[test]
    fn hash_is_read_big_endian() {
        let mut hash = [0; 32];
        hash[31] = 0xff;
        assert!(check_diff(&hash, u64::MAX));

        let mut hash = [0; 32];
        hash[0] = 0xff;
        assert!(!check_diff(&hash, 2));
    }
}
