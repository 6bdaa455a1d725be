//! Protocol module - wire envelope types and tag discrimination.
//!
//! Two envelope shapes cross the wire, discriminated by the numeric `t` tag:
//!
//! ```text
//! Request  { t: 0, i?: string, m: string, a: value[] }
//! Response { t: 1, i: string, r?: value, e?: value }
//! ```
//!
//! A request without `i` is fire-and-forget: no response will ever
//! reference it.

mod envelope;

pub use envelope::{Envelope, Request, Response, TAG_REQUEST, TAG_RESPONSE};
