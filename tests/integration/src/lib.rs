//! End-to-end tests for the directory account bridge.
//!
//! The scenarios live under `tests/`; this library is empty.

#![forbid(unsafe_code)]
