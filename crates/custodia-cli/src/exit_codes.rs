//! Unified exit codes for the custodia CLI.
//! These codes are part of the public contract for scripted callers.

pub const SUCCESS: i32 = 0;
pub const INTERNAL: i32 = 1; // store/ledger/IO failure
pub const BAD_BUNDLE: i32 = 2; // unrecognized format or limit violation
pub const REJECTED: i32 = 3; // integrity or signature validation failed
