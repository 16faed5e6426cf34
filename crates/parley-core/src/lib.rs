pub mod ids;
pub mod message;

pub use ids::{ClientId, MessageId};
pub use message::{ChatMessage, InboundFrame};
