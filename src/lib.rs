// SYNOID Forge
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod config;
pub mod generator;
pub mod health;
pub mod pipelines;
pub mod server;
pub mod session;
pub mod state;
pub mod transcode;
pub mod translation;
