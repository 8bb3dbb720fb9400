//! `lfgcore`: the dungeon-finder matchmaking core.
//!
//! Single-threaded and synchronous: the host calls the manager's entry
//! points (`process_join`, `process_leave`, `process_role_selection`) and
//! drives time by calling `update` once per frame. All player and world
//! state is read through the [`host::HostApi`] capability; everything the
//! core says back to players goes through a [`notify::NotificationSink`].

pub mod catalog;
pub mod host;
pub mod locks;
pub mod manager;
pub mod notify;
pub mod queue;
pub mod roles;

/// Members of a party must settle on roles within this window.
pub const ROLE_CHECK_TIME_LIMIT_MS: i64 = 120_000;

/// Cadence of matchmaking passes and queue-status pushes.
pub const QUEUE_UPDATE_INTERVAL_MS: i64 = 5_000;

/// Longest raid-browser comment the core stores, in bytes.
pub const MAX_COMMENT_LEN: usize = 255;

/// Party size the matchmaker fills toward: 1 tank, 1 healer, 3 damage.
pub const MAX_GROUP_SIZE: u8 = 5;
pub const NEEDED_TANKS: u8 = 1;
pub const NEEDED_HEALERS: u8 = 1;
pub const NEEDED_DAMAGE: u8 = 3;

pub use manager::LfgManager;
