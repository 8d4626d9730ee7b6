mod chat;
mod session;

pub use chat::*;
pub use session::*;
