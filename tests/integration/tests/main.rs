//! End-to-End Integration Tests
//!
//! These tests exchange SAML messages between an identity provider and a
//! service provider through the public API only: object construction,
//! signing, encryption, the HTTP bindings and the receiving pipeline.

mod common;
mod encryption;
mod interop;
mod object_model;
mod redirect;
mod sso_post;
mod wrapping;
