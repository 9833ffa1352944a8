pub mod contact;
pub mod message;
pub mod profile;

pub use contact::Contact;
pub use message::{ChatMessage, MessageRole, PART_SEPARATOR};
pub use profile::BotProfile;
