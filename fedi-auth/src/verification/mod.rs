//! Out-of-band verification codes.
//!
//! A code is a short numeric secret, delivered by private message, that proves
//! the requester can read the remote account's inbox.

mod code;
mod storage;
mod store;

pub use code::{generate_code, StoredCode, VerificationCode, CODE_LENGTH};
pub use storage::{CodeStorage, MemoryStorage};
pub use store::{CodePolicy, CodeStore};
