//! Natural-language understanding and generation clients for the dialogue
//! loop.
//!
//! The [`NluClient`] trait turns an utterance plus the serialized dialogue
//! context into an [`NluResult`]: a ranked list of candidate code sequences
//! in the semantic grammar. The [`NlgClient`] trait goes the other way,
//! turning a target act into surface text. [`HttpNluClient`] talks to a
//! hosted service and implements both; [`MockNluClient`] and
//! [`MockNlgClient`] replay scripted responses in tests.
//!
//! This crate does not understand the code tokens it transports; parsing
//! them into typed programs is the grammar collaborator's job.

mod client;
mod error;
mod http;
mod types;

pub use client::{
    MockNlgClient, MockNluClient, MockUtteranceRequest, NlgClient, NluClient, SharedNlg, SharedNlu,
};
pub use error::NluError;
pub use http::{HttpNluClient, NluConfig};
pub use types::{
    CandidateParse, CandidateScore, EntityMap, GeneratedUtterance, NluOptions, NluResult,
};
