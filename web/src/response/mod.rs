//! Response DTOs for endpoints whose payload is more than an `ApiResponse`.

pub(crate) mod interaction;
pub(crate) mod software;
