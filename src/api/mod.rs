// =============================================================================
// API Module — minimal authenticated status/snapshot surface
// =============================================================================
//
// The HTTP surface and dashboard rendering are external collaborators; this
// module exposes only the read/control interfaces the core pipeline needs to
// surface to them (state snapshots, recent signals/plans/trades, and a small
// set of operator controls over the runtime config).

pub mod auth;
pub mod rest;
