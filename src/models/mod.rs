// src/models/mod.rs

pub mod chat;
pub mod content;
pub mod guide;
pub mod leaderboard;
pub mod paper;
pub mod performance;
pub mod progress;
pub mod question;
pub mod user;
