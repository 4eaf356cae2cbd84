//! Runtime core for an Awelon Bytecode dialect.
//!
//! Programs in this family are values: products, sums, unbounded integers,
//! unit, sealed values, and blocks of quoted code. This crate provides the
//! typed value heap those programs live in — a per-context arena with
//! size-segregated free lists — together with the primitive value operations
//! an evaluator composes: introduce and eliminate, copy and drop, sum
//! wrapping, sealers, integer arithmetic, and binaries/texts as lazy lists.
//!
//! The bytecode parser, the evaluator, and persistent stowage are separate
//! components built on top of this API.

#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]

pub mod consts;
pub mod context;
pub mod error;
pub mod value;

mod block;
mod copy;
mod integer;
mod memory;
mod seal;
mod sum;
mod text;

pub use text::valid_token;

pub mod prelude {
    //! The types needed to drive a runtime context.

    #[doc(no_inline)]
    pub use crate::{
        context::{Context, Environment, MemoryStats},
        error::{ErrorSet, Result, RtError},
        valid_token,
        value::{BlockAttrs, SumTag, ValType},
    };
}
