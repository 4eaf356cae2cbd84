//! Tokens, texts, and binaries.
//!
//! A binary is the list `μL.((byte*L)+unit)`: one cell per element,
//! terminated by unit in the right. A text is the same shape over Unicode
//! code points restricted to the embedded-text alphabet. Reads walk the
//! list into a caller buffer, consuming cells as elements are delivered.

use crate::consts::TOKEN_MAX_BYTES;
use crate::context::Context;
use crate::copy;
use crate::error::{Result, RtError};
use crate::value::{Addr, ObjTag, Tag, Value};

fn is_control(c: char) -> bool {
    c < '\u{20}' || c == '\u{7f}'
}

// Valid in a token: no braces, no control codes, no replacement character.
fn token_char(c: char) -> bool {
    !(c == '{' || c == '}' || is_control(c) || c == '\u{fffd}')
}

// Valid in an embedded text: as tokens, but LF is welcome and braces are.
fn text_char(c: char) -> bool {
    !(is_control(c) && c != '\n') && c != '\u{fffd}'
}

/// Validate a sealer or opcode token: 1..=63 bytes of token-safe UTF-8.
pub fn valid_token(s: &str) -> bool {
    !s.is_empty() && s.len() <= TOKEN_MAX_BYTES && s.chars().all(token_char)
}

impl Context {
    /// Build a binary from `data` and push it.
    pub fn intro_binary(&mut self, data: &[u8]) -> Result<()> {
        let list = self.build_list(data.iter().map(|&b| Value::from_i32(i32::from(b))))?;
        self.push_owned(list)
    }

    /// Build a text from UTF-8 `bytes`, one code point per cell, and push
    /// it.
    ///
    /// Fails with [`RtError::Inval`] on malformed or truncated UTF-8 and on
    /// characters outside the text alphabet (control codes other than LF,
    /// the replacement character); nothing is allocated in that case.
    pub fn intro_text(&mut self, bytes: &[u8]) -> Result<()> {
        let s = core::str::from_utf8(bytes).map_err(|_| RtError::Inval)?;
        if !s.chars().all(text_char) {
            return Err(RtError::Inval);
        }
        let list = self.build_list(s.chars().map(|c| Value::from_i32(c as i32)))?;
        self.push_owned(list)
    }

    // Chain one cell per element. On allocation failure the partial list is
    // dropped and the error reported with the stack untouched.
    fn build_list(&mut self, items: impl Iterator<Item = Value>) -> Result<Value> {
        let mut head = Value::UNIT_INR;
        let mut tail_slot: Option<Addr> = None;
        for item in items {
            match self.alloc_cell(Tag::PairL, item.raw(), Value::UNIT_INR.raw()) {
                Ok(cell) => {
                    match tail_slot {
                        None => head = cell,
                        Some(slot) => self.arena().set_word(slot, cell.raw()),
                    }
                    tail_slot = Some(cell.addr() + crate::consts::WORD_SIZE);
                }
                Err(e) => {
                    let _ = copy::drop_value(self, head, true);
                    return Err(e);
                }
            }
        }
        Ok(head)
    }

    // One step of a list read: the next element, or None at the terminator.
    fn read_step(&mut self, cell: Addr) -> Result<Option<i32>> {
        let v = Value(self.arena().word(cell));
        if v == Value::UNIT_INR {
            return Ok(None);
        }
        if v.is_smallint() || v.addr() == 0 {
            return Err(RtError::TypeError);
        }
        if v.tag() == Tag::Obj {
            return match ObjTag::of(self.arena().word(v.addr())) {
                Some(ObjTag::Array) | Some(ObjTag::Binary) | Some(ObjTag::Text) => {
                    Err(RtError::Impl)
                }
                _ => Err(RtError::TypeError),
            };
        }
        if v.tag() != Tag::PairL {
            return Err(RtError::TypeError);
        }
        let (elem, next) = self.arena().cell(v.addr());
        let elem = Value(elem);
        if !elem.is_smallint() {
            return Err(RtError::TypeError);
        }
        self.arena().set_word(cell, next);
        self.free_cell(v.addr());
        Ok(Some(elem.as_i32()))
    }

    /// Read up to `buf.len()` bytes from the binary atop the stack,
    /// consuming the elements read and leaving the remainder in place.
    /// A zero-length result means the list terminator was reached.
    pub fn read_binary(&mut self, buf: &mut [u8]) -> Result<usize> {
        let cell = self.stack_cell()?;
        let mut read = 0;
        while read < buf.len() {
            match self.read_step(cell)? {
                None => break,
                Some(n) if (0..=255).contains(&n) => {
                    buf[read] = n as u8;
                    read += 1;
                }
                Some(_) => return Err(RtError::TypeError),
            }
        }
        Ok(read)
    }

    /// Read up to `max_chars` code points from the text atop the stack,
    /// encoding them as UTF-8 into `buf`. Stops early when the next code
    /// point would not fit the buffer. Returns `(bytes, chars)` read; both
    /// zero means the list terminator was reached.
    pub fn read_text(&mut self, buf: &mut [u8], max_chars: usize) -> Result<(usize, usize)> {
        let cell = self.stack_cell()?;
        let (mut bytes, mut chars) = (0, 0);
        while chars < max_chars {
            // check the element fits before consuming its cell
            let v = Value(self.arena().word(cell));
            if v == Value::UNIT_INR {
                break;
            }
            if !v.is_smallint() && v.addr() != 0 && v.tag() == Tag::PairL {
                let elem = Value(self.arena().word(v.addr()));
                if elem.is_smallint() {
                    let ch = u32::try_from(elem.as_i32())
                        .ok()
                        .and_then(char::from_u32)
                        .filter(|&c| text_char(c))
                        .ok_or(RtError::TypeError)?;
                    if bytes + ch.len_utf8() > buf.len() {
                        break;
                    }
                    ch.encode_utf8(&mut buf[bytes..]);
                    bytes += ch.len_utf8();
                    chars += 1;
                    let _ = self.read_step(cell)?;
                    continue;
                }
            }
            // let the shared walker report the precise error
            self.read_step(cell)?;
            return Err(RtError::TypeError);
        }
        Ok((bytes, chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_alphabet() {
        assert!(token_char('a'));
        assert!(token_char('→'));
        assert!(!token_char('{'));
        assert!(!token_char('}'));
        assert!(!token_char('\n'));
        assert!(!token_char('\u{7f}'));
        assert!(!token_char('\u{fffd}'));
    }

    #[test]
    fn text_alphabet() {
        assert!(text_char('\n'));
        assert!(text_char('{'));
        assert!(text_char('}'));
        assert!(!text_char('\r'));
        assert!(!text_char('\t'));
        assert!(!text_char('\u{fffd}'));
    }
}
