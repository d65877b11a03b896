//! WXLOOP - animated weather map overlays
//!
//! Time-windowed load scheduling and frame selection for radar, satellite
//! and forecast layers. Re-exports all modules for use by binary targets.

// Core engine (resolver, scheduler, sessions, playback, events)
pub mod core;

// Plain data and collaborator traits
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod paths;
pub mod sim;

// Re-export commonly used types from core
pub use core::animator::Animator;
pub use core::event_bus::{EventBus, Notification};
pub use core::scheduler::StrategyKind;

// Re-export entities
pub use entities::{Extent, LayerConfig, LayerKind, Millis, Renderer, TimeAxis};
