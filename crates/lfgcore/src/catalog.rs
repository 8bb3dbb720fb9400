//! Static activity catalog.
//!
//! Built once at startup from the host's master activity store plus the
//! `lfg_dungeon_template` / `lfg_dungeon_rewards` tables and the random
//! grouping rows. Immutable afterwards; bad rows are logged and skipped,
//! they never abort the load unless both tables are empty.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use lfgproto::slot::SlotCode;

use crate::host::{Difficulty, Holiday, HostApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    None,
    Dungeon,
    Raid,
    World,
    Heroic,
    Random,
}

impl ActivityKind {
    pub fn as_u8(self) -> u8 {
        match self {
            ActivityKind::None => 0,
            ActivityKind::Dungeon => 1,
            ActivityKind::Raid => 2,
            ActivityKind::World => 4,
            ActivityKind::Heroic => 5,
            ActivityKind::Random => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityFlags(pub u16);

impl ActivityFlags {
    pub const SEASONAL: u16 = 0x004;
    pub const LFR_A: u16 = 0x040;
    pub const LFR_B: u16 = 0x200;

    pub fn contains(self, bits: u16) -> bool {
        self.0 & bits != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entrance {
    pub map_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

/// One row of the master activity store.
#[derive(Debug, Clone)]
pub struct ActivityDef {
    pub id: u32,
    pub name: String,
    pub map_id: u32,
    pub difficulty: Difficulty,
    pub kind: ActivityKind,
    pub min_level: u8,
    pub max_level: u8,
    pub required_expansion: u8,
    pub flags: ActivityFlags,
    pub random_parent_id: u32,
}

impl ActivityDef {
    /// The packed code the wire uses for this activity.
    pub fn slot(&self) -> SlotCode {
        SlotCode::pack(self.id, self.kind.as_u8())
    }
}

/// Attached to catalog entries for the reward subsystem; the core does not
/// interpret these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardTier {
    pub max_level: u8,
    pub first_quest_id: u32,
    pub other_quest_id: u32,
    pub shortage_quest_id: u32,
    pub completions_per_period: u8,
    pub daily_reset: bool,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub def: ActivityDef,
    pub entrance: Option<Entrance>,
    pub required_item_level: u16,
    pub rewards: Vec<RewardTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRow {
    pub activity_id: u32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub orientation: f32,
    #[serde(default)]
    pub required_item_level: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRow {
    pub activity_id: u32,
    pub max_level: u8,
    #[serde(default)]
    pub first_quest_id: u32,
    #[serde(default)]
    pub other_quest_id: u32,
    #[serde(default)]
    pub shortage_quest_id: u32,
    #[serde(default)]
    pub completions_per_period: u8,
    #[serde(default)]
    pub daily_reset: bool,
}

/// Supplemental random-group membership on top of `random_parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingRow {
    pub activity_id: u32,
    pub random_activity_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogTables {
    #[serde(default)]
    pub templates: Vec<TemplateRow>,
    #[serde(default)]
    pub rewards: Vec<RewardRow>,
    #[serde(default)]
    pub groupings: Vec<GroupingRow>,
}

impl CatalogTables {
    pub fn load(path: &Path) -> anyhow::Result<CatalogTables> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read catalog tables {:?}: {e}", path))?;
        serde_json::from_str(&s)
            .map_err(|e| anyhow::anyhow!("failed to parse catalog tables {:?}: {e}", path))
    }
}

/// Maps the fixed list of seasonal activities to their gating holiday.
/// Activities outside this table are never in season.
pub fn season_holiday(activity_id: u32) -> Option<Holiday> {
    match activity_id {
        285 => Some(Holiday::HallowsEnd),      // The Headless Horseman
        286 => Some(Holiday::FireFestival),    // The Frost Lord Ahune
        287 => Some(Holiday::Brewfest),        // Coren Direbrew
        288 => Some(Holiday::LoveIsInTheAir),  // The Crown Chemical Co.
        _ => None,
    }
}

pub fn is_in_season(host: &dyn HostApi, activity_id: u32) -> bool {
    season_holiday(activity_id).is_some_and(|h| host.is_holiday_active(h))
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<u32, CatalogEntry>,
    random_expansions: HashMap<u32, BTreeSet<u32>>,
    master: Vec<ActivityDef>,
}

impl Catalog {
    /// Builds the catalog from the master store and the external tables.
    /// `map_entrances` supplies the per-map fallback used when a template
    /// row carries no coordinates.
    pub fn build(
        master: Vec<ActivityDef>,
        mut tables: CatalogTables,
        map_entrances: &HashMap<u32, Entrance>,
    ) -> anyhow::Result<Catalog> {
        if tables.templates.is_empty() && tables.rewards.is_empty() {
            anyhow::bail!("catalog tables are empty, nothing to queue for");
        }

        let defs: HashMap<u32, &ActivityDef> = master.iter().map(|d| (d.id, d)).collect();
        let mut entries = HashMap::new();
        let mut count = 0u32;

        for row in &tables.templates {
            let Some(def) = defs.get(&row.activity_id) else {
                error!(
                    activity_id = row.activity_id,
                    "catalog template row references unknown activity, skipping"
                );
                continue;
            };

            let mut entrance = if row.x == 0.0 && row.y == 0.0 && row.z == 0.0 {
                None
            } else {
                Some(Entrance {
                    map_id: def.map_id,
                    x: row.x,
                    y: row.y,
                    z: row.z,
                    orientation: row.orientation,
                })
            };

            // Rows without coordinates fall back to the map's default
            // entrance; random activities have no entrance at all.
            if entrance.is_none() && def.kind != ActivityKind::Random {
                match map_entrances.get(&def.map_id) {
                    Some(at) => entrance = Some(*at),
                    None => {
                        error!(
                            activity = %def.name,
                            activity_id = def.id,
                            map_id = def.map_id,
                            "no entrance coordinates and no map default, skipping"
                        );
                        continue;
                    }
                }
            }

            entries.insert(
                def.id,
                CatalogEntry {
                    def: (*def).clone(),
                    entrance,
                    required_item_level: row.required_item_level,
                    rewards: Vec::new(),
                },
            );
            count += 1;
        }

        // Reward tiers attach in (activity, max_level) order.
        tables
            .rewards
            .sort_by_key(|r| (r.activity_id, r.max_level));
        for row in &tables.rewards {
            let Some(entry) = entries.get_mut(&row.activity_id) else {
                error!(
                    activity_id = row.activity_id,
                    "reward row has no catalog entry, skipping"
                );
                continue;
            };
            entry.rewards.push(RewardTier {
                max_level: row.max_level,
                first_quest_id: row.first_quest_id,
                other_quest_id: row.other_quest_id,
                shortage_quest_id: row.shortage_quest_id,
                completions_per_period: row.completions_per_period,
                daily_reset: row.daily_reset,
            });
        }

        // Random activities expand to every catalogued non-random member,
        // by parent id and by the supplemental grouping rows.
        let mut random_expansions: HashMap<u32, BTreeSet<u32>> = HashMap::new();
        for entry in entries.values() {
            if entry.def.kind != ActivityKind::Random {
                continue;
            }
            let random_id = entry.def.id;

            for def in &master {
                if def.random_parent_id == random_id
                    && def.kind != ActivityKind::Random
                    && entries.contains_key(&def.id)
                {
                    random_expansions.entry(random_id).or_default().insert(def.id);
                }
            }

            for row in &tables.groupings {
                if row.random_activity_id == random_id && entries.contains_key(&row.activity_id) {
                    random_expansions
                        .entry(random_id)
                        .or_default()
                        .insert(row.activity_id);
                }
            }
        }

        info!(loaded = count, "initialized dungeon-finder activity catalog");
        Ok(Catalog {
            entries,
            random_expansions,
            master,
        })
    }

    pub fn get(&self, activity_id: u32) -> Option<&CatalogEntry> {
        self.entries.get(&activity_id)
    }

    /// The pre-computed concrete members of a random activity. Empty for
    /// anything that is not a catalogued random activity.
    pub fn expansion(&self, random_activity_id: u32) -> BTreeSet<u32> {
        self.random_expansions
            .get(&random_activity_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn master(&self) -> &[ActivityDef] {
        &self.master
    }

    /// Activities offered in the finder UI for a player: randoms and raids,
    /// plus dungeons carrying the seasonal or LFR flag, filtered by level
    /// range, account expansion and season.
    pub fn available_activity_ids(
        &self,
        host: &dyn HostApi,
        level: u8,
        expansion: u8,
    ) -> BTreeSet<u32> {
        let mut out = BTreeSet::new();

        for entry in self.entries.values() {
            let def = &entry.def;
            match def.kind {
                ActivityKind::Random | ActivityKind::Raid => {}
                ActivityKind::Dungeon => {
                    if !def
                        .flags
                        .contains(ActivityFlags::SEASONAL | ActivityFlags::LFR_A)
                    {
                        continue;
                    }
                }
                _ => continue,
            }

            if def.flags.contains(ActivityFlags::SEASONAL) && !is_in_season(host, def.id) {
                continue;
            }
            if level < def.min_level || level > def.max_level {
                continue;
            }
            if expansion < def.required_expansion {
                continue;
            }

            out.insert(def.id);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::TestHost;

    fn def(id: u32, kind: ActivityKind) -> ActivityDef {
        ActivityDef {
            id,
            name: format!("activity {id}"),
            map_id: 100 + id,
            difficulty: Difficulty::NORMAL,
            kind,
            min_level: 1,
            max_level: 85,
            required_expansion: 0,
            flags: ActivityFlags::default(),
            random_parent_id: 0,
        }
    }

    fn template(activity_id: u32) -> TemplateRow {
        TemplateRow {
            activity_id,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            orientation: 0.5,
            required_item_level: 0,
        }
    }

    #[test]
    fn unknown_template_rows_are_skipped() {
        let tables = CatalogTables {
            templates: vec![template(1), template(999)],
            ..Default::default()
        };
        let catalog =
            Catalog::build(vec![def(1, ActivityKind::Dungeon)], tables, &HashMap::new()).unwrap();
        assert!(catalog.get(1).is_some());
        assert!(catalog.get(999).is_none());
    }

    #[test]
    fn zero_coordinates_fall_back_to_map_entrance_or_skip() {
        let mut d1 = def(1, ActivityKind::Dungeon);
        d1.map_id = 10;
        let mut d2 = def(2, ActivityKind::Dungeon);
        d2.map_id = 11;

        let zero = |activity_id| TemplateRow {
            activity_id,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            orientation: 0.0,
            required_item_level: 0,
        };
        let tables = CatalogTables {
            templates: vec![zero(1), zero(2)],
            ..Default::default()
        };

        let mut map_entrances = HashMap::new();
        map_entrances.insert(
            10,
            Entrance {
                map_id: 10,
                x: 9.0,
                y: 8.0,
                z: 7.0,
                orientation: 0.0,
            },
        );

        let catalog = Catalog::build(vec![d1, d2], tables, &map_entrances).unwrap();
        assert_eq!(catalog.get(1).unwrap().entrance.unwrap().x, 9.0);
        assert!(catalog.get(2).is_none(), "no fallback entrance for map 11");
    }

    #[test]
    fn random_activities_need_no_entrance() {
        let tables = CatalogTables {
            templates: vec![TemplateRow {
                activity_id: 301,
                x: 0.0,
                y: 0.0,
                z: 0.0,
                orientation: 0.0,
                required_item_level: 0,
            }],
            ..Default::default()
        };
        let catalog =
            Catalog::build(vec![def(301, ActivityKind::Random)], tables, &HashMap::new()).unwrap();
        let entry = catalog.get(301).unwrap();
        assert!(entry.entrance.is_none());
    }

    #[test]
    fn rewards_attach_sorted_and_orphans_are_skipped() {
        let tables = CatalogTables {
            templates: vec![template(1)],
            rewards: vec![
                RewardRow {
                    activity_id: 1,
                    max_level: 85,
                    first_quest_id: 20,
                    other_quest_id: 0,
                    shortage_quest_id: 0,
                    completions_per_period: 0,
                    daily_reset: false,
                },
                RewardRow {
                    activity_id: 1,
                    max_level: 60,
                    first_quest_id: 10,
                    other_quest_id: 0,
                    shortage_quest_id: 0,
                    completions_per_period: 1,
                    daily_reset: true,
                },
                RewardRow {
                    activity_id: 5,
                    max_level: 85,
                    first_quest_id: 30,
                    other_quest_id: 0,
                    shortage_quest_id: 0,
                    completions_per_period: 0,
                    daily_reset: false,
                },
            ],
            ..Default::default()
        };
        let catalog =
            Catalog::build(vec![def(1, ActivityKind::Dungeon)], tables, &HashMap::new()).unwrap();
        let tiers = &catalog.get(1).unwrap().rewards;
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0].max_level, 60);
        assert_eq!(tiers[1].max_level, 85);
    }

    #[test]
    fn tables_round_trip_through_a_json_file() {
        let tables = CatalogTables {
            templates: vec![template(1)],
            rewards: Vec::new(),
            groupings: vec![GroupingRow {
                activity_id: 1,
                random_activity_id: 301,
            }],
        };
        let path = std::env::temp_dir().join(format!(
            "lfg_catalog_tables_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_string(&tables).unwrap()).unwrap();

        let loaded = CatalogTables::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.templates.len(), 1);
        assert_eq!(loaded.templates[0].activity_id, 1);
        assert_eq!(loaded.groupings[0].random_activity_id, 301);

        assert!(CatalogTables::load(Path::new("/nonexistent/tables.json")).is_err());
    }

    #[test]
    fn both_tables_empty_is_a_load_error() {
        let res = Catalog::build(
            vec![def(1, ActivityKind::Dungeon)],
            CatalogTables::default(),
            &HashMap::new(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn random_expansion_collects_parented_and_grouped_members() {
        let mut d1 = def(501, ActivityKind::Dungeon);
        d1.random_parent_id = 301;
        let mut d2 = def(502, ActivityKind::Dungeon);
        d2.random_parent_id = 301;
        // Random-typed children never join an expansion.
        let mut d3 = def(503, ActivityKind::Random);
        d3.random_parent_id = 301;
        let d4 = def(504, ActivityKind::Dungeon);

        let tables = CatalogTables {
            templates: vec![template(301), template(501), template(502), template(504)],
            groupings: vec![GroupingRow {
                activity_id: 504,
                random_activity_id: 301,
            }],
            ..Default::default()
        };

        let catalog = Catalog::build(
            vec![def(301, ActivityKind::Random), d1, d2, d3, d4],
            tables,
            &HashMap::new(),
        )
        .unwrap();

        let exp = catalog.expansion(301);
        assert_eq!(exp.into_iter().collect::<Vec<_>>(), vec![501, 502, 504]);
        assert!(catalog.expansion(999).is_empty());
    }

    #[test]
    fn expansion_is_empty_without_catalogued_members() {
        let mut orphan = def(501, ActivityKind::Dungeon);
        orphan.random_parent_id = 301;
        let tables = CatalogTables {
            templates: vec![template(301)], // 501 never gets a template row
            ..Default::default()
        };
        let catalog = Catalog::build(
            vec![def(301, ActivityKind::Random), orphan],
            tables,
            &HashMap::new(),
        )
        .unwrap();
        assert!(catalog.expansion(301).is_empty());
    }

    #[test]
    fn available_ids_filter_by_kind_flags_level_and_expansion() {
        let random = def(301, ActivityKind::Random);
        let raid = def(700, ActivityKind::Raid);
        let plain = def(101, ActivityKind::Dungeon);
        let mut lfr = def(102, ActivityKind::Dungeon);
        lfr.flags = ActivityFlags(ActivityFlags::LFR_A);
        let mut seasonal = def(285, ActivityKind::Dungeon);
        seasonal.flags = ActivityFlags(ActivityFlags::SEASONAL);
        let mut high = def(703, ActivityKind::Raid);
        high.min_level = 90;
        let mut future = def(704, ActivityKind::Raid);
        future.required_expansion = 5;

        let tables = CatalogTables {
            templates: vec![
                template(301),
                template(700),
                template(101),
                template(102),
                template(285),
                template(703),
                template(704),
            ],
            ..Default::default()
        };
        let catalog = Catalog::build(
            vec![random, raid, plain, lfr, seasonal, high, future],
            tables,
            &HashMap::new(),
        )
        .unwrap();

        let mut host = TestHost::default();
        let ids = catalog.available_activity_ids(&host, 85, 4);
        assert_eq!(ids.iter().copied().collect::<Vec<_>>(), vec![102, 301, 700]);

        // The seasonal boss shows up once its holiday is running.
        host.active_holidays.insert(Holiday::HallowsEnd);
        let ids = catalog.available_activity_ids(&host, 85, 4);
        assert!(ids.contains(&285));
    }
}
