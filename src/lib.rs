pub mod catalog;
pub mod config;
pub mod connection;
pub mod engine;
pub mod entity;
pub mod handlers;
pub mod migration;
pub mod registrations;
pub mod runner;
pub mod startup;
pub mod store;
pub mod telegram;
pub mod template;
pub mod types;
