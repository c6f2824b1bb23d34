//! Kudos Bot Library
//!
//! A Slack bot for giving each other kudos.
//!
//! This crate provides the core functionality for:
//! - Finding `<@user> ++` kudos in channel messages
//! - Storing kudos counts and history in SQLite
//! - Generating celebration lines with Google Gemini
//! - Talking to Slack over Socket Mode and the Web API

pub mod bot;
pub mod commands;
pub mod config;
pub mod gemini;
pub mod retry;
pub mod slack;
pub mod storage;
