// Application layer - validation in front of the store and the transfer engine.
// The service checks what the engine assumes (existing accounts, matching
// currency, positive amount) and maps storage failures to `AppError`.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
