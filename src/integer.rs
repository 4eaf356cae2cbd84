//! Integers: the small-int fast path and base-10⁹ BCD bignums.
//!
//! A bignum object is one tag word (sign and digit count) followed by
//! little-endian digits, each in `0..10⁹`. Representation is canonical: a
//! value lives in a small integer iff it fits one, bignums carry at least
//! two digits and no leading zero, and zero is always the small integer 0.

use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::consts::{BIGNUM_DIGIT, BIGNUM_MAX_DIGITS, SMALLINT_MAX, SMALLINT_MIN, WORD_SIZE};
use crate::context::Context;
use crate::error::{Result, RtError};
use crate::value::{bignum_digits, bignum_otag, bignum_positive, Addr, ObjTag, Tag, Value};

const DIGIT: u64 = BIGNUM_DIGIT as u64;

// The integer at the stack top, without consuming it.
enum IntPeek {
    Small(i32),
    Big {
        positive: bool,
        addr: Addr,
        digits: u32,
    },
}

fn int_peek(cx: &Context, v: Value) -> Result<IntPeek> {
    if v.is_smallint() {
        return Ok(IntPeek::Small(v.as_i32()));
    }
    let addr = v.addr();
    if v.tag() == Tag::Obj && addr != 0 {
        let otag = cx.arena().word(addr);
        if ObjTag::of(otag) == Some(ObjTag::Bignum) {
            return Ok(IntPeek::Big {
                positive: bignum_positive(otag),
                addr,
                digits: bignum_digits(otag),
            });
        }
    }
    Err(RtError::TypeError)
}

fn is_int(cx: &Context, v: Value) -> bool {
    int_peek(cx, v).is_ok()
}

// Sign and little-endian magnitude digits of an integer value.
fn int_digits(cx: &Context, v: Value) -> (bool, Vec<u32>) {
    match int_peek(cx, v).expect("operand checked as integer") {
        IntPeek::Small(n) => {
            let mag = n.unsigned_abs();
            (n >= 0, digits_of_u64(u64::from(mag)))
        }
        IntPeek::Big {
            positive,
            addr,
            digits,
        } => {
            let ds = (0..digits)
                .map(|i| cx.arena().word(addr + WORD_SIZE * (1 + i)))
                .collect();
            (positive, ds)
        }
    }
}

fn digits_of_u64(mut mag: u64) -> Vec<u32> {
    let mut ds = Vec::with_capacity(3);
    while mag > 0 {
        ds.push((mag % DIGIT) as u32);
        mag /= DIGIT;
    }
    ds
}

// Build a canonical integer value from sign and magnitude digits.
fn int_value(cx: &mut Context, positive: bool, digits: &[u32]) -> Result<Value> {
    let mut len = digits.len();
    while len > 0 && digits[len - 1] == 0 {
        len -= 1;
    }
    let digits = &digits[..len];
    let small = match digits {
        [] => Some(0i64),
        [d0] => Some(i64::from(*d0)),
        [d0, d1] => {
            let mag = u64::from(*d0) + u64::from(*d1) * DIGIT;
            (mag <= SMALLINT_MAX as u64).then(|| mag as i64)
        }
        _ => None,
    };
    if let Some(mag) = small {
        let n = if positive { mag } else { -mag };
        return Ok(Value::from_i32(n as i32));
    }
    if digits.len() as u64 > u64::from(BIGNUM_MAX_DIGITS) {
        return Err(RtError::CxFull);
    }
    let count = digits.len() as u32;
    let addr = cx.alloc(WORD_SIZE * (1 + count))?;
    cx.arena().set_word(addr, bignum_otag(positive, count));
    for (i, &d) in digits.iter().enumerate() {
        cx.arena().set_word(addr + WORD_SIZE * (1 + i as u32), d);
    }
    Ok(Value::tagged(Tag::Obj, addr))
}

fn int_value_i64(cx: &mut Context, n: i64) -> Result<Value> {
    if (i64::from(SMALLINT_MIN)..=i64::from(SMALLINT_MAX)).contains(&n) {
        return Ok(Value::from_i32(n as i32));
    }
    let ds = digits_of_u64(n.unsigned_abs());
    int_value(cx, n >= 0, &ds)
}

// Free the storage behind an integer value (a no-op for small integers).
fn free_int(cx: &mut Context, v: Value) {
    if let Ok(IntPeek::Big { addr, digits, .. }) = int_peek(cx, v) {
        cx.free(WORD_SIZE * (1 + digits), addr);
    }
}

/* magnitude arithmetic on little-endian digit vectors */

fn trim(v: &mut Vec<u32>) {
    while v.last() == Some(&0) {
        v.pop();
    }
}

fn mag_cmp(a: &[u32], b: &[u32]) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.iter().rev().cmp(b.iter().rev()))
}

fn mag_add(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u32;
    for i in 0..a.len().max(b.len()) {
        let mut d = carry + a.get(i).copied().unwrap_or(0) + b.get(i).copied().unwrap_or(0);
        carry = 0;
        if d >= BIGNUM_DIGIT {
            d -= BIGNUM_DIGIT;
            carry = 1;
        }
        out.push(d);
    }
    if carry > 0 {
        out.push(carry);
    }
    out
}

// Requires `a >= b`.
fn mag_sub(a: &[u32], b: &[u32]) -> Vec<u32> {
    debug_assert!(mag_cmp(a, b) != Ordering::Less);
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0u32;
    for i in 0..a.len() {
        let sub = b.get(i).copied().unwrap_or(0) + borrow;
        let d = a[i];
        if d >= sub {
            out.push(d - sub);
            borrow = 0;
        } else {
            out.push(d + BIGNUM_DIGIT - sub);
            borrow = 1;
        }
    }
    debug_assert_eq!(borrow, 0);
    trim(&mut out);
    out
}

fn mag_mul(a: &[u32], b: &[u32]) -> Vec<u32> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0u32; a.len() + b.len()];
    for (i, &da) in a.iter().enumerate() {
        let mut carry = 0u64;
        for (j, &db) in b.iter().enumerate() {
            let cur = u64::from(out[i + j]) + u64::from(da) * u64::from(db) + carry;
            out[i + j] = (cur % DIGIT) as u32;
            carry = cur / DIGIT;
        }
        let mut k = i + b.len();
        while carry > 0 {
            let cur = u64::from(out[k]) + carry;
            out[k] = (cur % DIGIT) as u32;
            carry = cur / DIGIT;
            k += 1;
        }
    }
    trim(&mut out);
    out
}

fn mag_mul_digit(a: &[u32], d: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + 1);
    let mut carry = 0u64;
    for &da in a {
        let cur = u64::from(da) * u64::from(d) + carry;
        out.push((cur % DIGIT) as u32);
        carry = cur / DIGIT;
    }
    while carry > 0 {
        out.push((carry % DIGIT) as u32);
        carry /= DIGIT;
    }
    trim(&mut out);
    out
}

// Truncated magnitude division; `b` must be non-empty.
fn mag_div_rem(a: &[u32], b: &[u32]) -> (Vec<u32>, Vec<u32>) {
    debug_assert!(!b.is_empty());
    if mag_cmp(a, b) == Ordering::Less {
        return (Vec::new(), a.to_vec());
    }
    if b.len() == 1 {
        let d = u64::from(b[0]);
        let mut q = vec![0u32; a.len()];
        let mut rem = 0u64;
        for i in (0..a.len()).rev() {
            let cur = rem * DIGIT + u64::from(a[i]);
            q[i] = (cur / d) as u32;
            rem = cur % d;
        }
        trim(&mut q);
        let rem = if rem == 0 { Vec::new() } else { vec![rem as u32] };
        return (q, rem);
    }
    // Schoolbook long division. Each quotient digit is found by binary
    // search over 0..10⁹; the classic two-digit estimate needs divisor
    // normalization to bound its error and buys nothing at these sizes.
    let mut q = vec![0u32; a.len()];
    let mut rem: Vec<u32> = Vec::new();
    for i in (0..a.len()).rev() {
        rem.insert(0, a[i]);
        trim(&mut rem);
        if mag_cmp(&rem, b) == Ordering::Less {
            continue;
        }
        let (mut lo, mut hi) = (1u32, BIGNUM_DIGIT - 1);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if mag_cmp(&mag_mul_digit(b, mid), &rem) == Ordering::Greater {
                hi = mid - 1;
            } else {
                lo = mid;
            }
        }
        q[i] = lo;
        rem = mag_sub(&rem, &mag_mul_digit(b, lo));
    }
    trim(&mut q);
    (q, rem)
}

fn signed_add(pa: bool, a: &[u32], pb: bool, b: &[u32]) -> (bool, Vec<u32>) {
    if pa == pb {
        return (pa, mag_add(a, b));
    }
    match mag_cmp(a, b) {
        Ordering::Equal => (true, Vec::new()),
        Ordering::Greater => (pa, mag_sub(a, b)),
        Ordering::Less => (pb, mag_sub(b, a)),
    }
}

// Floor division: the remainder takes the divisor's sign.
#[allow(clippy::type_complexity)]
fn signed_div(pa: bool, a: &[u32], pb: bool, b: &[u32]) -> (bool, Vec<u32>, bool, Vec<u32>) {
    let (qm, rm) = mag_div_rem(a, b);
    if pa == pb {
        (true, qm, pb, rm)
    } else if rm.is_empty() {
        (false, qm, true, rm)
    } else {
        (false, mag_add(&qm, &[1]), pb, mag_sub(b, &rm))
    }
}

fn parse_decimal(s: &str) -> Result<(bool, Vec<u32>)> {
    let bytes = s.as_bytes();
    let (positive, ds) = match bytes.split_first() {
        Some((b'-', rest)) => (false, rest),
        _ => (true, bytes),
    };
    if ds.is_empty() || !ds.iter().all(u8::is_ascii_digit) {
        return Err(RtError::Inval);
    }
    if ds.len() > 1 && ds[0] == b'0' {
        return Err(RtError::Inval);
    }
    if !positive && ds == b"0" {
        return Err(RtError::Inval);
    }
    let mut digits = Vec::with_capacity(ds.len() / 9 + 1);
    for chunk in ds.rchunks(9) {
        digits.push(chunk.iter().fold(0u32, |n, &c| n * 10 + u32::from(c - b'0')));
    }
    trim(&mut digits);
    Ok((positive, digits))
}

impl Context {
    /// Push a 32-bit integer.
    pub fn intro_i32(&mut self, n: i32) -> Result<()> {
        self.intro_i64(i64::from(n))
    }

    /// Push a 64-bit integer.
    pub fn intro_i64(&mut self, n: i64) -> Result<()> {
        let v = int_value_i64(self, n)?;
        self.push_owned(v)
    }

    /// Push an integer given in decimal: an optional `-`, then digits with
    /// no redundant leading zero.
    pub fn intro_istr(&mut self, s: &str) -> Result<()> {
        let (positive, digits) = parse_decimal(s)?;
        let v = int_value(self, positive, &digits)?;
        self.push_owned(v)
    }

    /// Read the integer atop the stack, without consuming it.
    ///
    /// Fails with [`RtError::BuffSz`] when the value does not fit an `i32`.
    pub fn peek_i32(&self) -> Result<i32> {
        match int_peek(self, self.top()?)? {
            IntPeek::Small(n) => Ok(n),
            IntPeek::Big {
                positive,
                addr,
                digits,
            } => {
                if digits > 2 {
                    return Err(RtError::BuffSz);
                }
                let d0 = u64::from(self.arena().word(addr + WORD_SIZE));
                let d1 = u64::from(self.arena().word(addr + 2 * WORD_SIZE));
                let mag = d0 + d1 * DIGIT;
                let limit = if positive {
                    i32::MAX as u64
                } else {
                    i32::MIN.unsigned_abs() as u64
                };
                if mag > limit {
                    return Err(RtError::BuffSz);
                }
                Ok(if positive {
                    mag as i32
                } else {
                    (-(mag as i64)) as i32
                })
            }
        }
    }

    /// Read the integer atop the stack, without consuming it.
    ///
    /// Fails with [`RtError::BuffSz`] when the value does not fit an `i64`.
    pub fn peek_i64(&self) -> Result<i64> {
        match int_peek(self, self.top()?)? {
            IntPeek::Small(n) => Ok(i64::from(n)),
            IntPeek::Big {
                positive,
                addr,
                digits,
            } => {
                if digits > 3 {
                    return Err(RtError::BuffSz);
                }
                let mut mag = 0u128;
                for i in (0..digits).rev() {
                    mag = mag * u128::from(DIGIT)
                        + u128::from(self.arena().word(addr + WORD_SIZE * (1 + i)));
                }
                let limit = if positive {
                    i64::MAX as u128
                } else {
                    i64::MIN.unsigned_abs() as u128
                };
                if mag > limit {
                    return Err(RtError::BuffSz);
                }
                Ok(if positive {
                    mag as i64
                } else {
                    (mag as i128).wrapping_neg() as i64
                })
            }
        }
    }

    /// Print the integer atop the stack in decimal, without consuming it.
    pub fn peek_istr(&self) -> Result<String> {
        match int_peek(self, self.top()?)? {
            IntPeek::Small(n) => Ok(n.to_string()),
            IntPeek::Big {
                positive,
                addr,
                digits,
            } => {
                let mut out = String::with_capacity(1 + 9 * digits as usize);
                if !positive {
                    out.push('-');
                }
                let digit = |i: u32| self.arena().word(addr + WORD_SIZE * (1 + i));
                let _ = write!(out, "{}", digit(digits - 1));
                for i in (0..digits - 1).rev() {
                    let _ = write!(out, "{:09}", digit(i));
                }
                Ok(out)
            }
        }
    }

    // The two integer operands `(b, (a, e))`; `b` is the top.
    fn int_cells(&self) -> Result<(Addr, Addr)> {
        let cb = self.stack_cell()?;
        let (b, rest) = self.arena().cell(cb);
        let ca = Value(rest).pair_cell().ok_or(RtError::TypeError)?;
        let a = self.arena().word(ca);
        if !is_int(self, Value(b)) || !is_int(self, Value(a)) {
            return Err(RtError::TypeError);
        }
        Ok((cb, ca))
    }

    // Replace `(b, (a, e))` with `(r, e)`, freeing the operand storage.
    fn finish_binop(&mut self, cb: Addr, ca: Addr, r: Value) {
        let a = Value(self.arena().word(ca));
        let b = Value(self.arena().word(cb));
        free_int(self, a);
        free_int(self, b);
        self.arena().set_word(ca, r.raw());
        let rest = Value(self.arena().word(cb + WORD_SIZE));
        self.set_root(rest);
        self.free_cell(cb);
    }

    /// `(b, (a, e)) → (a+b, e)`.
    pub fn int_add(&mut self) -> Result<()> {
        let (cb, ca) = self.int_cells()?;
        let a = Value(self.arena().word(ca));
        let b = Value(self.arena().word(cb));
        let r = if a.is_smallint() && b.is_smallint() {
            int_value_i64(self, i64::from(a.as_i32()) + i64::from(b.as_i32()))?
        } else {
            let (pa, da) = int_digits(self, a);
            let (pb, db) = int_digits(self, b);
            let (p, d) = signed_add(pa, &da, pb, &db);
            int_value(self, p, &d)?
        };
        self.finish_binop(cb, ca, r);
        Ok(())
    }

    /// `(b, (a, e)) → (a·b, e)`.
    pub fn int_mul(&mut self) -> Result<()> {
        let (cb, ca) = self.int_cells()?;
        let a = Value(self.arena().word(ca));
        let b = Value(self.arena().word(cb));
        let r = if a.is_smallint() && b.is_smallint() {
            int_value_i64(self, i64::from(a.as_i32()) * i64::from(b.as_i32()))?
        } else {
            let (pa, da) = int_digits(self, a);
            let (pb, db) = int_digits(self, b);
            let d = mag_mul(&da, &db);
            int_value(self, pa == pb || d.is_empty(), &d)?
        };
        self.finish_binop(cb, ca, r);
        Ok(())
    }

    /// Negate the integer atop the stack in place. Zero stays zero.
    pub fn int_neg(&mut self) -> Result<()> {
        let cell = self.stack_cell()?;
        match int_peek(self, Value(self.arena().word(cell)))? {
            IntPeek::Small(n) => {
                self.arena().set_word(cell, Value::from_i32(-n).raw());
            }
            IntPeek::Big { addr, .. } => {
                let otag = self.arena().word(addr);
                self.arena().set_word(addr, otag ^ (1 << 8));
            }
        }
        Ok(())
    }

    /// `(divisor, (dividend, e)) → (remainder, (quotient, e))`.
    ///
    /// Floor division: the remainder takes the divisor's sign, so
    /// `-11 ÷ 3` is quotient `-4` remainder `1`. Division by zero is a
    /// [`RtError::TypeError`].
    pub fn int_div(&mut self) -> Result<()> {
        let (cb, ca) = self.int_cells()?;
        let a = Value(self.arena().word(ca));
        let b = Value(self.arena().word(cb));
        if b == Value::from_i32(0) {
            return Err(RtError::TypeError);
        }
        let (qv, rv) = if a.is_smallint() && b.is_smallint() {
            let (x, y) = (i64::from(a.as_i32()), i64::from(b.as_i32()));
            let mut q = x / y;
            let mut r = x % y;
            if r != 0 && (r < 0) != (y < 0) {
                q -= 1;
                r += y;
            }
            (int_value_i64(self, q)?, int_value_i64(self, r)?)
        } else {
            let (pa, da) = int_digits(self, a);
            let (pb, db) = int_digits(self, b);
            let (pq, dq, pr, dr) = signed_div(pa, &da, pb, &db);
            let qv = int_value(self, pq, &dq)?;
            match int_value(self, pr, &dr) {
                Ok(rv) => (qv, rv),
                Err(e) => {
                    let _ = crate::copy::drop_value(self, qv, true);
                    return Err(e);
                }
            }
        };
        free_int(self, a);
        free_int(self, b);
        self.arena().set_word(ca, qv.raw());
        self.arena().set_word(cb, rv.raw());
        Ok(())
    }
}
