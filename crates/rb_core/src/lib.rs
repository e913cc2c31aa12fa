//! # rb_core - Real-Time Decision Agent for a Physics Ball Game
//!
//! This library plays a soccer-like game of jumping robot spheres: each game
//! tick it receives a JSON snapshot of the world and must answer with one
//! command per controlled robot within a tight time budget.
//!
//! ## Features
//! - 100% deterministic simulation and search (same seed = same commands)
//! - Static trajectory precompute with on-contact promotion
//! - Iteration- and deadline-bounded anytime search with warm start
//! - JSON wire contract for easy harness integration

// Loop style - can fix incrementally
#![allow(clippy::needless_range_loop)]

pub mod engine;
pub mod error;

// Re-export the surface a harness needs
pub use engine::arena::{ArenaGeometry, BoxArena, SurfaceContact};
pub use engine::rules::RuleSet;
pub use engine::score::Role;
pub use engine::search::{MatchSession, PassBudget, SearchBudget, SearchProbe};
pub use engine::simulator::PromotionPolicy;
pub use engine::snapshot::{Command, GameSnapshot, RobotCommand};
pub use error::{AgentError, Result};
