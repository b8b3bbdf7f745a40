//! Application layer containing the core business logic orchestration.
//!
//! This module defines the `CommissionEngine`, the single entry point for
//! commission lifecycle operations. It owns the collaborator ports and
//! serializes state transitions per record.

pub mod engine;
