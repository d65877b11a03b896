//! Core engine modules - resolution, scheduling, sessions, playback, events
//!
//! These modules form the animation engine, independent of any map toolkit.

pub mod animator;
pub mod debounced_update;
pub mod event_bus;
pub mod frame_selector;
pub mod governor;
pub mod load_queue;
pub mod player;
pub mod prefs;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use animator::Animator;
pub use debounced_update::DebouncedUpdate;
pub use event_bus::{EventBus, LoadErrorParams, Notification};
pub use governor::Governor;
pub use load_queue::{LoadQueue, LoadQueueItem};
pub use player::Transport;
pub use prefs::{JsonPreferenceStore, MemoryPreferenceStore};
pub use resolver::{Resolution, ResolvedLayer, ResolverParams, TimePolicy, resolve};
pub use scheduler::{Scheduler, Strategy, StrategyKind};
pub use session::{LoadIdAllocator, Session};
pub use workers::Workers;
