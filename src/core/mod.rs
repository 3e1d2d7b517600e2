// ─── Cursepack Core ───
// Modpack resolution, fetch, layout, and reconciliation engine.
//
// Architecture:
//   core/
//     registry/  — CurseForge API client behind the `Registry` trait
//     pack.rs    — pack manifest parsing + pseudo-ID derivation
//     manifests.rs — persisted install state + reconciliation helpers
//     installer/ — orchestrator, excludes, downloads, overrides, worlds
//     loaders/   — Forge and Fabric server installers + dispatcher
//     results.rs — KEY=VALUE results file for startup scripts

pub mod error;
pub mod installer;
pub mod loaders;
pub mod manifests;
pub mod pack;
pub mod registry;
pub mod results;
