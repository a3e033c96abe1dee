pub mod controller;
pub mod session;

pub use controller::RegisterController;
pub use session::{LineItemDelta, OrderSession, SessionState, MAX_QUANTITY};
