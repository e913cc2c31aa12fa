//! Simulation and search engine.
//!
//! The data flow per game tick: a [`snapshot::GameSnapshot`] comes in, the
//! [`search::MatchSession`] runs one hill-climbing pass per controlled robot
//! over a [`simulator::Simulator`], and the first tick of each winning
//! [`plan::Plan`] goes back out as a [`snapshot::Command`].

pub mod arena;
pub mod entity;
pub mod plan;
pub mod rules;
pub mod score;
pub mod search;
pub mod simulator;
pub mod snapshot;
pub mod vec;
