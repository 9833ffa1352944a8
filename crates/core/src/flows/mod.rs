pub mod router;
pub mod state;

pub use router::{route, Branch};
pub use state::{
    CollectedData, ConversationMode, ConversationState, DurableState, Sentiment, Stage, StatePatch,
};
