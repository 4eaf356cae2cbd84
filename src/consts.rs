//! Runtime layout parameters.

use static_assertions::const_assert;

/// Size in bytes of a value word.
pub const WORD_SIZE: u32 = 4;

/// Size in bytes of a cell, the minimum allocation unit (two value words).
pub const CELL_SIZE: u32 = 2 * WORD_SIZE;

/// Memory acquired from the shared pool is requested in multiples of this.
pub const PAGE_SIZE: u32 = 1 << 14;

/// Number of exact-size quick-fit free lists, spaced by the cell size.
pub const FL_QUICK_FIT: usize = 16;

/// Number of first-fit free lists with doubling upper bounds.
pub const FL_FIRST_FIT: usize = 10;

/// Total number of size-segregated free lists.
pub const FL_COUNT: usize = FL_QUICK_FIT + FL_FIRST_FIT;

/// Largest request served by the quick-fit lists, in bytes.
pub const QUICK_FIT_MAX: u32 = FL_QUICK_FIT as u32 * CELL_SIZE;

/// Largest integer representable without heap allocation.
pub const SMALLINT_MAX: i32 = (1 << 30) - 1;

/// Smallest small integer. The range is symmetric so negation is closed.
pub const SMALLINT_MIN: i32 = -SMALLINT_MAX;

/// Base of a bignum digit: a compact binary-coded decimal in `0..10⁹`,
/// every digit fitting 30 bits.
pub const BIGNUM_DIGIT: u32 = 1_000_000_000;

/// Maximum digit count of a bignum; the tag word keeps 23 bits for it.
pub const BIGNUM_MAX_DIGITS: u32 = (1 << 23) - 1;

/// Maximum length of a sealer or opcode token, in bytes.
pub const TOKEN_MAX_BYTES: usize = 63;

/// Smallest usable context arena, in bytes.
pub const CX_MIN_SIZE: u32 = 1 << 22;

/// Largest supported context arena; addresses must fit the word encoding.
pub const CX_MAX_SIZE: u32 = 1 << 30;

const_assert!(CELL_SIZE == 8);
const_assert!(QUICK_FIT_MAX == 128);
const_assert!(PAGE_SIZE % CELL_SIZE == 0);
const_assert!(CX_MIN_SIZE % PAGE_SIZE == 0);
const_assert!(CX_MAX_SIZE % PAGE_SIZE == 0);
const_assert!(SMALLINT_MAX as u32 >= BIGNUM_DIGIT);
