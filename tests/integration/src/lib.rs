//! End-to-end SAML scenarios.
//!
//! The scenarios live under `tests/`; this library target only exists so the
//! package has a build target.
