//! Read-only view of the host game server.
//!
//! The core never mutates host state. Everything it needs to know about
//! players, groups and the world comes through this capability; tests plug
//! in an in-memory implementation.

use lfgproto::ids::{GroupId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Warrior,
    Paladin,
    Hunter,
    Rogue,
    Priest,
    DeathKnight,
    Shaman,
    Mage,
    Warlock,
    Druid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Alliance,
    Horde,
}

/// Dungeon difficulty tier. Anything above normal carries a raid-style
/// instance save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Difficulty(pub u8);

impl Difficulty {
    pub const NORMAL: Difficulty = Difficulty(1);
    pub const HEROIC: Difficulty = Difficulty(2);
}

/// In-game holidays gating seasonal activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holiday {
    HallowsEnd,
    FireFestival,
    Brewfest,
    LoveIsInTheAir,
}

/// Snapshot of a connected player, taken at call time.
#[derive(Debug, Clone, Copy)]
pub struct PlayerView {
    pub class: Class,
    pub level: u8,
    pub expansion: u8,
    pub item_level: u16,
    pub faction: Faction,
    pub group: Option<GroupId>,
    pub can_join_dungeon_finder: bool,
    pub in_battleground: bool,
    pub in_arena: bool,
    pub in_battleground_queue: bool,
    pub has_deserter_debuff: bool,
    pub has_random_cooldown: bool,
    pub gm_frozen: bool,
}

/// Entry gate for a map+difficulty, mirroring the host's access table.
/// `item` set means item OR fallback_item unlocks; only `fallback_item` set
/// means that item alone is required.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessRequirement {
    pub achievement: Option<u32>,
    pub quest_alliance: Option<u32>,
    pub quest_horde: Option<u32>,
    pub item: Option<u32>,
    pub fallback_item: Option<u32>,
}

pub trait HostApi {
    fn now_unix(&self) -> i64;

    /// Returns None for unknown or disconnected players.
    fn player(&self, player: PlayerId) -> Option<PlayerView>;

    fn is_saved_to_instance(&self, player: PlayerId, map_id: u32, difficulty: Difficulty) -> bool;
    fn has_achievement(&self, player: PlayerId, achievement_id: u32) -> bool;
    fn has_completed_quest(&self, player: PlayerId, quest_id: u32) -> bool;
    fn has_item(&self, player: PlayerId, item_id: u32) -> bool;

    fn group_leader(&self, group: GroupId) -> Option<PlayerId>;
    /// Connected members only.
    fn group_members(&self, group: GroupId) -> Vec<PlayerId>;
    /// Total member count, including disconnected members.
    fn group_size(&self, group: GroupId) -> u8;

    fn is_map_disabled(&self, map_id: u32) -> bool;
    fn is_dungeon_finder_map_disabled(&self, map_id: u32) -> bool;
    fn access_requirement(&self, map_id: u32, difficulty: Difficulty)
        -> Option<AccessRequirement>;
    fn is_holiday_active(&self, holiday: Holiday) -> bool;
}

#[cfg(test)]
pub mod testing {
    use std::collections::{HashMap, HashSet};

    use super::*;

    #[derive(Debug, Clone)]
    pub struct TestGroup {
        pub leader: PlayerId,
        pub members: Vec<PlayerId>,
        pub total: u8,
    }

    /// In-memory host for unit tests.
    #[derive(Debug, Default)]
    pub struct TestHost {
        pub now: i64,
        pub players: HashMap<PlayerId, PlayerView>,
        pub groups: HashMap<GroupId, TestGroup>,
        pub saved_instances: HashSet<(PlayerId, u32, Difficulty)>,
        pub achievements: HashSet<(PlayerId, u32)>,
        pub quests: HashSet<(PlayerId, u32)>,
        pub items: HashSet<(PlayerId, u32)>,
        pub disabled_maps: HashSet<u32>,
        pub disabled_finder_maps: HashSet<u32>,
        pub access: HashMap<(u32, Difficulty), AccessRequirement>,
        pub active_holidays: HashSet<Holiday>,
    }

    impl TestHost {
        pub fn add_player(&mut self, id: PlayerId, view: PlayerView) {
            self.players.insert(id, view);
        }

        /// Registers a fully-connected group and points every member at it.
        pub fn add_group(&mut self, id: GroupId, leader: PlayerId, members: &[PlayerId]) {
            for m in members {
                if let Some(view) = self.players.get_mut(m) {
                    view.group = Some(id);
                }
            }
            self.groups.insert(
                id,
                TestGroup {
                    leader,
                    members: members.to_vec(),
                    total: members.len() as u8,
                },
            );
        }
    }

    pub fn view(class: Class, level: u8) -> PlayerView {
        PlayerView {
            class,
            level,
            expansion: 4,
            item_level: 400,
            faction: Faction::Alliance,
            group: None,
            can_join_dungeon_finder: true,
            in_battleground: false,
            in_arena: false,
            in_battleground_queue: false,
            has_deserter_debuff: false,
            has_random_cooldown: false,
            gm_frozen: false,
        }
    }

    impl HostApi for TestHost {
        fn now_unix(&self) -> i64 {
            self.now
        }

        fn player(&self, player: PlayerId) -> Option<PlayerView> {
            self.players.get(&player).copied()
        }

        fn is_saved_to_instance(
            &self,
            player: PlayerId,
            map_id: u32,
            difficulty: Difficulty,
        ) -> bool {
            self.saved_instances.contains(&(player, map_id, difficulty))
        }

        fn has_achievement(&self, player: PlayerId, achievement_id: u32) -> bool {
            self.achievements.contains(&(player, achievement_id))
        }

        fn has_completed_quest(&self, player: PlayerId, quest_id: u32) -> bool {
            self.quests.contains(&(player, quest_id))
        }

        fn has_item(&self, player: PlayerId, item_id: u32) -> bool {
            self.items.contains(&(player, item_id))
        }

        fn group_leader(&self, group: GroupId) -> Option<PlayerId> {
            self.groups.get(&group).map(|g| g.leader)
        }

        fn group_members(&self, group: GroupId) -> Vec<PlayerId> {
            self.groups
                .get(&group)
                .map(|g| g.members.clone())
                .unwrap_or_default()
        }

        fn group_size(&self, group: GroupId) -> u8 {
            self.groups.get(&group).map(|g| g.total).unwrap_or(0)
        }

        fn is_map_disabled(&self, map_id: u32) -> bool {
            self.disabled_maps.contains(&map_id)
        }

        fn is_dungeon_finder_map_disabled(&self, map_id: u32) -> bool {
            self.disabled_finder_maps.contains(&map_id)
        }

        fn access_requirement(
            &self,
            map_id: u32,
            difficulty: Difficulty,
        ) -> Option<AccessRequirement> {
            self.access.get(&(map_id, difficulty)).copied()
        }

        fn is_holiday_active(&self, holiday: Holiday) -> bool {
            self.active_holidays.contains(&holiday)
        }
    }
}
