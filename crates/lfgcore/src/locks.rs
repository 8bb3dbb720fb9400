//! Per-player activity locks.
//!
//! `evaluate` is a pure function of the player snapshot, the catalog entry
//! and the host state at call time. The rule order is load-bearing: the
//! first matching rule decides the reported reason.

use std::collections::HashMap;

use tracing::warn;

use lfgproto::codes::LockKind;
use lfgproto::ids::PlayerId;
use lfgproto::slot::SlotCode;

use crate::catalog::{is_in_season, ActivityFlags, ActivityKind, Catalog, CatalogEntry};
use crate::host::{AccessRequirement, Difficulty, Faction, HostApi, PlayerView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockDetail {
    pub reason: LockKind,
    pub required: u32,
    pub current: u32,
}

impl LockDetail {
    fn plain(reason: LockKind) -> LockDetail {
        LockDetail {
            reason,
            required: 0,
            current: 0,
        }
    }
}

fn access_lock(
    host: &dyn HostApi,
    player: PlayerId,
    view: &PlayerView,
    ar: &AccessRequirement,
) -> Option<LockKind> {
    if let Some(achievement) = ar.achievement {
        if !host.has_achievement(player, achievement) {
            return Some(LockKind::MissingAchievement);
        }
    }

    let quest = match view.faction {
        Faction::Alliance => ar.quest_alliance,
        Faction::Horde => ar.quest_horde,
    };
    if let Some(quest) = quest {
        if !host.has_completed_quest(player, quest) {
            return Some(LockKind::QuestNotCompleted);
        }
    }

    // With a primary item set, the fallback item is an alternative way in;
    // a lone fallback item is simply required.
    match (ar.item, ar.fallback_item) {
        (Some(item), fallback) => {
            let has_fallback = fallback.is_some_and(|i| host.has_item(player, i));
            if !host.has_item(player, item) && !has_fallback {
                return Some(LockKind::MissingItem);
            }
        }
        (None, Some(fallback)) => {
            if !host.has_item(player, fallback) {
                return Some(LockKind::MissingItem);
            }
        }
        (None, None) => {}
    }

    None
}

/// Decides whether `entry` is currently open to the player. `None` means
/// eligible; a `Some` carries the reason plus the required/current item
/// levels for the gear-score case.
pub fn evaluate(
    host: &dyn HostApi,
    player: PlayerId,
    view: &PlayerView,
    entry: &CatalogEntry,
) -> Option<LockDetail> {
    let def = &entry.def;

    let reason = if !view.can_join_dungeon_finder {
        Some(LockKind::None)
    } else if def.required_expansion > view.expansion {
        Some(LockKind::InsufficientExpansion)
    } else if host.is_map_disabled(def.map_id) || host.is_dungeon_finder_map_disabled(def.map_id) {
        Some(LockKind::None)
    } else if def.difficulty > Difficulty::NORMAL
        && host.is_saved_to_instance(player, def.map_id, def.difficulty)
    {
        Some(LockKind::RaidLocked)
    } else if def.min_level > view.level {
        Some(LockKind::TooLowLevel)
    } else if def.max_level < view.level {
        Some(LockKind::TooHighLevel)
    } else if def.flags.contains(ActivityFlags::SEASONAL) && !is_in_season(host, def.id) {
        Some(LockKind::NotInSeason)
    } else if entry.required_item_level > view.item_level {
        Some(LockKind::TooLowGearScore)
    } else if let Some(ar) = host.access_requirement(def.map_id, def.difficulty) {
        access_lock(host, player, view, &ar)
    } else {
        None
    };

    reason.map(|reason| {
        if reason == LockKind::TooLowGearScore {
            LockDetail {
                reason,
                required: u32::from(entry.required_item_level),
                current: u32::from(view.item_level),
            }
        } else {
            LockDetail::plain(reason)
        }
    })
}

/// Lock map for a candidate selection, keyed by slot code. Random entries
/// pass unchecked; their members were already substituted in.
pub fn lock_map_for<'a, I>(
    host: &dyn HostApi,
    player: PlayerId,
    view: &PlayerView,
    catalog: &Catalog,
    activity_ids: I,
) -> HashMap<SlotCode, LockDetail>
where
    I: IntoIterator<Item = &'a u32>,
{
    let mut locks = HashMap::new();
    for &activity_id in activity_ids {
        let Some(entry) = catalog.get(activity_id) else {
            continue;
        };
        if entry.def.kind == ActivityKind::Random {
            continue;
        }
        if let Some(detail) = evaluate(host, player, view, entry) {
            locks.insert(entry.def.slot(), detail);
        }
    }
    locks
}

/// Full lock map over the master store, for the player/party lock-info
/// side channel. Activities missing a catalog entry are locked outright
/// (world activities excepted), then every catalogued one is evaluated.
pub fn locked_activities_for_player(
    host: &dyn HostApi,
    player: PlayerId,
    catalog: &Catalog,
) -> HashMap<SlotCode, LockDetail> {
    let mut locks = HashMap::new();

    let Some(view) = host.player(player) else {
        warn!(player = player.0, "player not in game while determining locked activities");
        return locks;
    };

    for def in catalog.master() {
        if catalog.get(def.id).is_some() {
            continue;
        }
        if def.kind == ActivityKind::World {
            continue;
        }
        locks.insert(def.slot(), LockDetail::plain(LockKind::None));
    }

    for def in catalog.master() {
        let Some(entry) = catalog.get(def.id) else {
            continue;
        };
        if let Some(detail) = evaluate(host, player, &view, entry) {
            locks.insert(entry.def.slot(), detail);
        }
    }

    locks
}
