// =============================================================================
// API Module
// =============================================================================
//
// HTTP surface of the engine:
// - Bearer-token management/read endpoints (contacts, settings, devices,
//   alerts, summaries)
// - Cron-secret scheduler trigger for the alert scanner

pub mod auth;
pub mod rest;
