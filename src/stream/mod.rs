//! Incremental reconciliation of a workflow event stream into one turn.
//!
//! Bytes flow through [`Utf8Decoder`], the text is cut into lines by
//! [`LineSplitter`], `data:` lines become [`StreamFrame`]s and the
//! [`Reconciler`] folds them into a [`TurnAccumulator`].
//!
//! [`StreamFrame`]: crate::models::StreamFrame
//! [`TurnAccumulator`]: crate::models::TurnAccumulator

pub mod decoder;
pub mod framer;
pub mod reconciler;

pub use decoder::Utf8Decoder;
pub use framer::{LineSplitter, frame_payload};
pub use reconciler::{Reconciler, TurnOutcome, unwrap_answer};
