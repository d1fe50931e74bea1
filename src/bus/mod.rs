pub mod queue;
pub mod trigger;

pub use queue::DropHeadQueue;
pub use trigger::{Handler, QueueItem, StartupHook, TopicMatch, Trigger};
</content>
