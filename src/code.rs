//! Room codes: short, human-enterable identifiers for live rooms.

use rand::Rng;
use serde::Serialize;
use std::fmt;

/// Uppercase letters and digits without the look-alikes I, O and 0
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ123456789";
pub const CODE_LENGTH: usize = 4;
/// Generation attempts before room creation gives up
pub const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRoomCode {
    #[error("Room code must be exactly 4 characters")]
    Length,
    #[error("Room code contains invalid character '{0}'")]
    Character(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate client input. Lowercase letters are accepted and normalized.
    pub fn parse(raw: &str) -> Result<Self, InvalidRoomCode> {
        let code = raw.trim().to_ascii_uppercase();
        if code.chars().count() != CODE_LENGTH {
            return Err(InvalidRoomCode::Length);
        }
        if let Some(bad) = code
            .chars()
            .find(|c| !c.is_ascii() || !CODE_ALPHABET.contains(&(*c as u8)))
        {
            return Err(InvalidRoomCode::Character(bad));
        }
        Ok(Self(code))
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies candidate codes; collisions are checked by the store on insert
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> RoomCode;
}

pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> RoomCode {
        RoomCode::random(&mut rand::rng())
    }
}
