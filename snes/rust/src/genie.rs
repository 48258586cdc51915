//! The module for game genie and pro action replay codes. Only decoding is supported.

use common_emulator::{all_hex, hex_value};

/// The game genie letters, in order of the hex digit they stand for
const GENIE_HEX: &[u8; 16] = b"DF4709156BC8A23E";

/// The possible errors decoding a vendor code
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CodeError {
    /// One or more of the characters are not valid for the kind of code.
    InvalidCodeCharacters,
    /// Invalid number of digits found in the code
    InvalidLength,
}

/// Represents a valid game genie code
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GameGenieCode {
    /// The code for an actual game genie
    code: String,
    /// The target address of the code
    target: u32,
    /// The replacement value for the code at the specified address.
    new_value: u8,
}

impl GameGenieCode {
    /// Convert a string reference to a game genie code, if possible. Codes look like `xxxx-xxxx`.
    pub fn from_str(i: &str) -> Result<Self, CodeError> {
        let b = i.as_bytes();
        if b.len() != 9 || b[4] != b'-' {
            return Err(CodeError::InvalidLength);
        }
        if !all_hex(&i[0..4]) || !all_hex(&i[5..9]) {
            return Err(CodeError::InvalidCodeCharacters);
        }
        let mut data: u32 = 0;
        for d in b.iter().filter(|c| **c != b'-') {
            let d = d.to_ascii_uppercase();
            let digit = GENIE_HEX
                .iter()
                .position(|g| *g == d)
                .ok_or(CodeError::InvalidCodeCharacters)?;
            data = (data << 4) | digit as u32;
        }
        let a = data & 0xffffff;
        let target = ((a & 0x003c00) << 10)
            | ((a & 0x00003c) << 14)
            | ((a & 0xf00000) >> 8)
            | ((a & 0x000003) << 10)
            | ((a & 0x00c000) >> 6)
            | ((a & 0x0f0000) >> 12)
            | ((a & 0x0003c0) >> 6);
        Ok(Self {
            code: i.to_string(),
            target,
            new_value: (data >> 24) as u8,
        })
    }

    /// The code as it was entered
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The address that gets modified
    pub fn address(&self) -> u32 {
        self.target
    }

    /// The value that gets written
    pub fn value(&self) -> u8 {
        self.new_value
    }
}

/// Represents a valid pro action replay code, eight hex digits of address followed by value.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProActionReplayCode {
    /// The target address of the code
    target: u32,
    /// The replacement value
    new_value: u8,
}

impl ProActionReplayCode {
    /// Convert a string reference to a pro action replay code, if possible.
    pub fn from_str(i: &str) -> Result<Self, CodeError> {
        if i.len() != 8 {
            return Err(CodeError::InvalidLength);
        }
        let mut data: u32 = 0;
        for c in i.chars() {
            let v = hex_value(c).ok_or(CodeError::InvalidCodeCharacters)?;
            data = (data << 4) | v as u32;
        }
        Ok(Self {
            target: data >> 8,
            new_value: data as u8,
        })
    }

    /// The address that gets modified
    pub fn address(&self) -> u32 {
        self.target
    }

    /// The value that gets written
    pub fn value(&self) -> u8 {
        self.new_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genie_address_scramble() {
        let c = GameGenieCode::from_str("DDDD-DDDF").unwrap();
        assert_eq!(c.address(), 0x000400);
        assert_eq!(c.value(), 0x00);

        let c = GameGenieCode::from_str("6DDD-DDDF").unwrap();
        assert_eq!(c.address(), 0x000400);
        assert_eq!(c.value(), 0x80);

        let c = GameGenieCode::from_str("dddd-7add").unwrap();
        assert_eq!(c.address(), 0xf00000);
        assert_eq!(c.code(), "dddd-7add");
    }

    #[test]
    fn genie_rejects_bad_codes() {
        assert_eq!(
            GameGenieCode::from_str("DDDDDDDDD"),
            Err(CodeError::InvalidLength)
        );
        assert_eq!(
            GameGenieCode::from_str("DDD-DDDDD"),
            Err(CodeError::InvalidLength)
        );
        assert_eq!(
            GameGenieCode::from_str("DDDD-DDDG"),
            Err(CodeError::InvalidCodeCharacters)
        );
        assert_eq!(
            GameGenieCode::from_str("7E0010=63"),
            Err(CodeError::InvalidLength)
        );
    }

    #[test]
    fn action_replay() {
        let c = ProActionReplayCode::from_str("7E001063").unwrap();
        assert_eq!(c.address(), 0x7e0010);
        assert_eq!(c.value(), 0x63);
        assert_eq!(
            ProActionReplayCode::from_str("7E00106"),
            Err(CodeError::InvalidLength)
        );
        assert_eq!(
            ProActionReplayCode::from_str("7E00106Z"),
            Err(CodeError::InvalidCodeCharacters)
        );
    }
}
