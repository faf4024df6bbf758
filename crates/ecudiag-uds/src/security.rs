//! Security access seed-to-key transforms
//!
//! Four fixed 32-round transforms over unsigned 32-bit arithmetic. They must
//! stay bit-exact with the ECU side: a wrong key is not detected locally, the
//! ECU rejects it with NRC 0x35 (invalidKey).

use crate::uds::UdsError;

/// Rounds applied by every level
pub const CIPHER_ROUNDS: u32 = 32;

/// Level 1: rotate by 3 or 7 depending on the low bit
pub fn level1(seed: u32, key: u32) -> u32 {
    let mut token = seed ^ key;
    for _ in 0..CIPHER_ROUNDS {
        token = if token & 0x01 != 0 {
            token.rotate_left(3) ^ seed
        } else {
            token.rotate_right(7) ^ key
        };
    }
    token
}

/// Level 2: shift right, feed back seed or key depending on the shifted-out bit
pub fn level2(seed: u32, key: u32) -> u32 {
    let mut token = seed ^ key;
    for _ in 0..CIPHER_ROUNDS {
        let low_bit = token & 0x01;
        token >>= 1;
        token ^= if low_bit != 0 { seed } else { key };
    }
    token
}

/// Level 3: derived from the seed alone, then rotated left by 15
///
/// Every round recomputes the token from the unchanged seed, so only the last
/// round is observable. The loop is kept to match the ECU reference.
pub fn level3(seed: u32, key: u32) -> u32 {
    let mut token = seed ^ key;
    for _ in 0..CIPHER_ROUNDS {
        token = if seed & 0x8000_0000 != 0 {
            (((seed >> 1) ^ seed) << 3) ^ (seed >> 3)
        } else {
            (seed >> 3) ^ (seed << 9)
        };
        token ^= key;
    }
    token.rotate_left(15)
}

/// Level 4: rotate left by 7 and mix in the key
pub fn level4(seed: u32, key: u32) -> u32 {
    let mut token = seed ^ key;
    for _ in 0..CIPHER_ROUNDS {
        token = token.rotate_left(7) ^ key;
    }
    token
}

/// Security level as selected by the key-submission sub-function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherLevel {
    Level1,
    Level2,
    Level3,
    Level4,
}

impl CipherLevel {
    pub fn compute(self, seed: u32, key: u32) -> u32 {
        match self {
            CipherLevel::Level1 => level1(seed, key),
            CipherLevel::Level2 => level2(seed, key),
            CipherLevel::Level3 => level3(seed, key),
            CipherLevel::Level4 => level4(seed, key),
        }
    }

    /// Request-seed sub-function (odd)
    pub fn seed_subfunction(self) -> u8 {
        self.key_subfunction() - 1
    }

    /// Send-key sub-function (even)
    pub fn key_subfunction(self) -> u8 {
        match self {
            CipherLevel::Level1 => 0x02,
            CipherLevel::Level2 => 0x04,
            CipherLevel::Level3 => 0x06,
            CipherLevel::Level4 => 0x08,
        }
    }
}

impl TryFrom<u8> for CipherLevel {
    type Error = UdsError;

    /// Map a send-key sub-function (0x02, 0x04, 0x06, 0x08) to its level
    fn try_from(subfunction: u8) -> Result<Self, Self::Error> {
        match subfunction {
            0x02 => Ok(CipherLevel::Level1),
            0x04 => Ok(CipherLevel::Level2),
            0x06 => Ok(CipherLevel::Level3),
            0x08 => Ok(CipherLevel::Level4),
            other => Err(UdsError::UnsupportedSecurityLevel(other)),
        }
    }
}

/// Key for the send-key sub-function `level`
pub fn compute_key(level: u8, seed: u32, constant: u32) -> Result<u32, UdsError> {
    Ok(CipherLevel::try_from(level)?.compute(seed, constant))
}
