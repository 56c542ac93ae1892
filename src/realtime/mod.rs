pub mod events;
pub mod handlers;
pub mod rooms;

pub use events::*;
pub use handlers::*;
pub use rooms::*;
