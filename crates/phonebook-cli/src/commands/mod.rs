pub mod common;
pub mod contact;
pub mod directory;
pub mod quick;
pub mod sync;
