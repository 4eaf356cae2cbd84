//! Sealed values.
//!
//! A sealed value is an opaque wrapper carrying a token; only presenting
//! the same token unwraps it. Small discretionary sealers — a `:` followed
//! by up to three bytes — pack the token directly into the tag word and
//! cost a single cell. Everything else stores the token bytes inline after
//! the wrapper cell.

use crate::consts::CELL_SIZE;
use crate::context::Context;
use crate::error::{Result, RtError};
use crate::text::valid_token;
use crate::value::{seal_len, ObjTag, Tag, Value};

impl Context {
    /// Seal the value atop the stack with `token` (1..=63 bytes of
    /// token-safe UTF-8).
    pub fn wrap_seal(&mut self, token: &str) -> Result<()> {
        if !valid_token(token) {
            return Err(RtError::Inval);
        }
        let cell = self.stack_cell()?;
        let v = Value(self.arena().word(cell));
        let bytes = token.as_bytes();
        let sealed = if bytes[0] == b':' && bytes.len() <= 4 {
            let mut otag = ObjTag::SealSm as u32;
            for (i, &b) in bytes.iter().enumerate().skip(1) {
                otag |= u32::from(b) << (8 * i);
            }
            self.alloc_cell(Tag::Obj, otag, v.raw())?
        } else {
            let len = bytes.len() as u32;
            let addr = self.alloc(CELL_SIZE + len)?;
            self.arena()
                .set_cell(addr, (len << 8) | ObjTag::Seal as u32, v.raw());
            self.arena().write_bytes(addr + CELL_SIZE, bytes);
            Value::tagged(Tag::Obj, addr)
        };
        self.arena().set_word(cell, sealed.raw());
        Ok(())
    }

    /// Remove the sealer wrapping the value atop the stack, returning its
    /// token.
    pub fn unwrap_seal(&mut self) -> Result<String> {
        let cell = self.stack_cell()?;
        let v = Value(self.arena().word(cell));
        if v.is_smallint() || v.tag() != Tag::Obj || v.addr() == 0 {
            return Err(RtError::TypeError);
        }
        let addr = v.addr();
        let (otag, inner) = self.arena().cell(addr);
        let token = match ObjTag::of(otag) {
            Some(ObjTag::SealSm) => {
                let mut tok = vec![b':'];
                for i in 1..4 {
                    let b = (otag >> (8 * i)) as u8;
                    if b != 0 {
                        tok.push(b);
                    }
                }
                self.free_cell(addr);
                tok
            }
            Some(ObjTag::Seal) => {
                let len = seal_len(otag);
                let tok = self.arena().read_bytes(addr + CELL_SIZE, len as usize);
                self.free(CELL_SIZE + len, addr);
                tok
            }
            _ => return Err(RtError::TypeError),
        };
        self.arena().set_word(cell, inner);
        Ok(String::from_utf8(token).expect("sealer tokens are validated utf-8"))
    }
}
