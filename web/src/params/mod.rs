//! This module holds typed parameters for various endpoint inputs.
//!
//! Inputs arrive as forms, JSON bodies or query strings shaped by the sign-in
//! page; each struct here mirrors one of them and converts into the
//! `fedi-auth` request type it stands for.

pub(crate) mod interaction;
pub(crate) mod software;
