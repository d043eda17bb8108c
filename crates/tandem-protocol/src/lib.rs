//! Wire protocol for Tandem.
//!
//! This crate defines what two peers put on the channel between them:
//!
//! - **Messages** ([`Message`], [`Invocation`], [`Response`]): the two
//!   positional array shapes and their validation.
//! - **Identity** ([`RequestId`], [`FunctionHandle`], [`Target`]): the
//!   integers and names that correlate calls and responses.
//! - **Envelopes** ([`WrappedValue`], [`WrappedError`],
//!   [`WrappedFunction`]): tagged objects for values that can't travel as
//!   plain JSON.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer knows nothing about live values or channels. The
//! peer turns values into JSON (with codecs), then uses this crate to
//! build and validate messages.
//!
//! ```text
//! Channel (JSON arrays) → Protocol (Message) → Peer (values, functions)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod envelope;
mod error;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use envelope::{
    ENVELOPE_TAG, UNDEFINED_KIND, WrappedError, WrappedFunction, WrappedValue,
};
pub use error::ProtocolError;
pub use message::{Invocation, Message, Response};
pub use types::{FunctionHandle, RequestId, Target};
