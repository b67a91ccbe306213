//! Brigada - role-based community portal
//!
//! Accounts, a document archive gated by classification and publication
//! status, a member directory, and user administration with typed
//! confirmation for destructive actions.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod policy;
pub mod services;
pub mod web;

#[cfg(test)]
mod test_support;
