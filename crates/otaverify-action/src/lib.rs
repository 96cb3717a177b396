#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Sequential action framework for the verification pipeline.
//!
//! Layout: `action.rs` (capability trait and completer), `pipe.rs` (single-slot
//! pipes and bonding), `processor.rs` (FIFO scheduler), `delegate.rs`
//! (observer trait and event-bus delegate), `builtin.rs` (feeder/collector),
//! `code.rs` (completion codes).

mod action;
mod builtin;
mod code;
mod delegate;
mod pipe;
mod processor;

pub use action::{Action, ActionCompleter, ActionId};
pub use builtin::{CollectedObject, CollectorAction, FeederAction};
pub use code::ErrorCode;
pub use delegate::{ActionProcessorDelegate, EventBusDelegate};
pub use pipe::{ActionPipe, ActionPipes, TypedAction, bond_actions};
pub use processor::ActionProcessor;
