pub mod event;
pub mod session;
pub mod user;

pub use event::{Event, EventPatch, EventPayload};
pub use session::Session;
pub use user::User;
