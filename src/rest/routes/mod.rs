pub mod auth;
pub mod gamification;
pub mod health;
pub mod performance;
pub mod tasks;
