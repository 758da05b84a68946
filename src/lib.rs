//! Neuroevolution of sensor-driven cars on a multi-lane road.
//!
//! Each AI car casts a fan of rays ([`sensor`]) against the road borders and
//! traffic, feeds the normalized distances through a threshold perceptron
//! ([`network`]) and drives with the resulting controls ([`car`]). When a
//! generation ends, the best brain is stored and the next population is
//! seeded from it with tiered mutation ([`evolution`]).

pub mod analysis;
pub mod car;
pub mod config;
pub mod engine;
pub mod evolution;
pub mod geometry;
pub mod manager;
pub mod model;
pub mod network;
pub mod road;
pub mod sensor;
pub mod stats;
pub mod store;
