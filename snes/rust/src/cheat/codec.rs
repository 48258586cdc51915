//! Conversion between cheat codes as text and cheats.
//!
//! Six forms of code are understood, tried in this order:
//! * game genie, `xxxx-xxxx`
//! * pro action replay, eight hex digits
//! * `address=condition?value`
//! * `address=value`
//! * `address/condition/value`
//! * `address/value`
//!
//! Several codes can be combined into a group with `+` between them.

use super::{Cheat, CheatError};
use crate::genie::{GameGenieCode, ProActionReplayCode};

/// Reads hex numbers and punctuation out of a line of text, tolerating whitespace in between.
struct Scanner<'a> {
    /// The text that has not been consumed yet
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    /// Start scanning a piece of text
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    /// Read a hex number, with an optional 0x prefix. Fails when there are no digits.
    fn hex(&mut self) -> Option<u32> {
        let mut s = self.rest.trim_start();
        if let Some(p) = s.strip_prefix("0x").or(s.strip_prefix("0X")) {
            if p.starts_with(|c: char| c.is_ascii_hexdigit()) {
                s = p;
            }
        }
        let len = s
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(s.len());
        if len == 0 {
            return None;
        }
        let v = s[..len].chars().fold(0u32, |acc, c| {
            acc.wrapping_shl(4) | common_emulator::hex_value(c).unwrap_or(0) as u32
        });
        self.rest = &s[len..];
        Some(v)
    }

    /// Consume a single punctuation character
    fn literal(&mut self, c: char) -> bool {
        let s = self.rest.trim_start();
        match s.strip_prefix(c) {
            Some(r) => {
                self.rest = r;
                true
            }
            None => false,
        }
    }
}

/// Scan `address <first> number [<second> number]`. With a second delimiter the numbers are returned in the order they appear.
fn scan(text: &str, first: char, second: Option<char>) -> Option<(u32, u32, Option<u32>)> {
    let mut s = Scanner::new(text);
    let address = s.hex()?;
    if !s.literal(first) {
        return None;
    }
    let a = s.hex()?;
    match second {
        Some(d) => {
            if !s.literal(d) {
                return None;
            }
            let b = s.hex()?;
            Some((address, a, Some(b)))
        }
        None => Some((address, a, None)),
    }
}

/// Convert a single code into a cheat
fn decode(text: &str) -> Option<Cheat> {
    if let Ok(c) = GameGenieCode::from_str(text) {
        return Some(Cheat::new(c.address(), c.value()));
    }
    if let Ok(c) = ProActionReplayCode::from_str(text) {
        return Some(Cheat::new(c.address(), c.value()));
    }
    if let Some((a, c, Some(v))) = scan(text, '=', Some('?')) {
        return Some(Cheat::conditional(a, v as u8, c as u8));
    }
    if let Some((a, v, _)) = scan(text, '=', None) {
        return Some(Cheat::new(a, v as u8));
    }
    if let Some((a, c, Some(v))) = scan(text, '/', Some('/')) {
        return Some(Cheat::conditional(a, v as u8, c as u8));
    }
    if let Some((a, v, _)) = scan(text, '/', None) {
        return Some(Cheat::new(a, v as u8));
    }
    None
}

/// Parse a single code. A code that resolves to address zero is treated as unparseable.
pub fn parse_cheat(text: &str) -> Result<Cheat, CheatError> {
    let text = text.trim();
    match decode(text) {
        Some(c) if c.address() != 0 => Ok(c),
        _ => Err(CheatError::ParseFailure(text.to_string())),
    }
}

/// Parse a group of codes separated by `+`. Codes that can't be parsed are left out.
pub fn parse_group(text: &str) -> Vec<Cheat> {
    text.split('+')
        .filter_map(|seg| match parse_cheat(seg) {
            Ok(c) => Some(c),
            Err(e) => {
                if !seg.trim().is_empty() {
                    log::debug!("Skipping code: {}", e);
                }
                None
            }
        })
        .collect()
}

/// The canonical text of a single cheat
pub fn cheat_to_text(c: &Cheat) -> String {
    match c.condition() {
        Some(cond) => format!("{:06x}={:02x}?{:02x}", c.address(), cond, c.value()),
        None => format!("{:06x}={:02x}", c.address(), c.value()),
    }
}

/// The canonical text of a group of cheats
pub fn group_to_text(cheats: &[Cheat]) -> String {
    cheats
        .iter()
        .map(cheat_to_text)
        .collect::<Vec<_>>()
        .join(" + ")
}
