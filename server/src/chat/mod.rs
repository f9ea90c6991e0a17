//! Point-to-point chat between connected players.

pub mod direct;
