//! DriverStage - staged device driver promotion
//!
//! Drivers live in four folders per base path: Native (factory baseline),
//! Active (in use), New (inbound candidates) and Archive (superseded).
//! A run promotes the newest eligible candidate per vendor, archiving the
//! driver it replaces.

pub mod engine;
