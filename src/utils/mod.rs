//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `coapsub` application.
//!
//! It centralizes the error types shared between the broker and the
//! transport, and the one-time logging setup.

pub mod error;
pub mod logging;
