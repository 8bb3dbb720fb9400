//! lfg_refs: scripted reference scenarios against the matchmaking core.
//!
//! Runs the canonical flows (solo random join, party role check, role-check
//! timeout) against an in-memory world and logs every notification the core
//! emits. Useful for eyeballing packet sequences without a client.

use std::collections::{BTreeSet, HashMap, HashSet};

use lfgcore::catalog::{
    ActivityDef, ActivityFlags, ActivityKind, Catalog, CatalogTables, TemplateRow,
};
use lfgcore::host::{
    AccessRequirement, Class, Difficulty, Faction, Holiday, HostApi, PlayerView,
};
use lfgcore::notify::NotificationSink;
use lfgcore::LfgManager;
use lfgproto::ids::{GroupId, PlayerId, RequesterId, RoleMask, ROLE_DAMAGE, ROLE_HEAL, ROLE_TANK};
use lfgproto::msg::{
    JoinResultMsg, QueueStatusMsg, RoleCheckUpdateMsg, RoleChosenMsg, StatusUpdateMsg,
};
use tracing::{info, Level};

fn usage_and_exit() -> ! {
    eprintln!(
        "lfg_refs\n\n\
USAGE:\n  lfg_refs [--scenario solo|party|timeout|all]\n\n\
ENV:\n  SCENARIO  default all\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    scenario: String,
}

fn parse_args() -> Config {
    let mut scenario = std::env::var("SCENARIO").unwrap_or_else(|_| "all".to_string());

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => scenario = it.next().unwrap_or_else(|| usage_and_exit()),
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config { scenario }
}

/// Minimal in-memory world the core reads from.
#[derive(Default)]
struct World {
    now: i64,
    players: HashMap<PlayerId, PlayerView>,
    groups: HashMap<GroupId, (PlayerId, Vec<PlayerId>)>,
    active_holidays: HashSet<Holiday>,
}

impl World {
    fn add_player(&mut self, id: PlayerId, class: Class, level: u8, item_level: u16) {
        self.players.insert(
            id,
            PlayerView {
                class,
                level,
                expansion: 4,
                item_level,
                faction: Faction::Alliance,
                group: None,
                can_join_dungeon_finder: true,
                in_battleground: false,
                in_arena: false,
                in_battleground_queue: false,
                has_deserter_debuff: false,
                has_random_cooldown: false,
                gm_frozen: false,
            },
        );
    }

    fn form_group(&mut self, group: GroupId, leader: PlayerId, members: &[PlayerId]) {
        for member in members {
            if let Some(view) = self.players.get_mut(member) {
                view.group = Some(group);
            }
        }
        self.groups.insert(group, (leader, members.to_vec()));
    }
}

impl HostApi for World {
    fn now_unix(&self) -> i64 {
        self.now
    }

    fn player(&self, player: PlayerId) -> Option<PlayerView> {
        self.players.get(&player).copied()
    }

    fn is_saved_to_instance(&self, _: PlayerId, _: u32, _: Difficulty) -> bool {
        false
    }

    fn has_achievement(&self, _: PlayerId, _: u32) -> bool {
        false
    }

    fn has_completed_quest(&self, _: PlayerId, _: u32) -> bool {
        false
    }

    fn has_item(&self, _: PlayerId, _: u32) -> bool {
        false
    }

    fn group_leader(&self, group: GroupId) -> Option<PlayerId> {
        self.groups.get(&group).map(|(leader, _)| *leader)
    }

    fn group_members(&self, group: GroupId) -> Vec<PlayerId> {
        self.groups
            .get(&group)
            .map(|(_, members)| members.clone())
            .unwrap_or_default()
    }

    fn group_size(&self, group: GroupId) -> u8 {
        self.group_members(group).len() as u8
    }

    fn is_map_disabled(&self, _: u32) -> bool {
        false
    }

    fn is_dungeon_finder_map_disabled(&self, _: u32) -> bool {
        false
    }

    fn access_requirement(&self, _: u32, _: Difficulty) -> Option<AccessRequirement> {
        None
    }

    fn is_holiday_active(&self, holiday: Holiday) -> bool {
        self.active_holidays.contains(&holiday)
    }
}

/// Logs every outbound message instead of writing packets.
struct LogSink;

impl NotificationSink for LogSink {
    fn join_result(&mut self, to: PlayerId, msg: &JoinResultMsg) {
        info!(
            to = to.0,
            result = ?msg.result,
            detail = ?msg.detail,
            ticket = msg.ticket.map(|t| t.id),
            locked_players = msg.blacklist.len(),
            "join result"
        );
    }

    fn status_update(&mut self, to: PlayerId, msg: &StatusUpdateMsg) {
        info!(
            to = to.0,
            reason = ?msg.reason,
            ticket = msg.ticket.id,
            joined = msg.joined,
            queued = msg.queued,
            lfg_joined = msg.lfg_joined,
            "status update"
        );
    }

    fn role_check_update(&mut self, to: PlayerId, msg: &RoleCheckUpdateMsg) {
        info!(
            to = to.0,
            state = ?msg.state,
            beginning = msg.is_beginning,
            confirmed = msg.members.iter().filter(|m| m.confirmed).count(),
            members = msg.members.len(),
            "role check update"
        );
    }

    fn role_chosen(&mut self, to: PlayerId, msg: &RoleChosenMsg) {
        info!(
            to = to.0,
            player = msg.player.0,
            roles = msg.roles.0,
            accepted = msg.accepted,
            "role chosen"
        );
    }

    fn queue_status(&mut self, to: PlayerId, msg: &QueueStatusMsg) {
        info!(
            to = to.0,
            ticket = msg.ticket.id,
            time_in_queue = msg.time_in_queue,
            avg_wait = msg.avg_wait,
            needed = ?msg.needed_roles,
            "queue status"
        );
    }
}

fn demo_catalog() -> anyhow::Result<Catalog> {
    let def = |id, kind, map_id, random_parent_id| ActivityDef {
        id,
        name: format!("demo activity {id}"),
        map_id,
        difficulty: Difficulty::NORMAL,
        kind,
        min_level: 80,
        max_level: 85,
        required_expansion: 3,
        flags: ActivityFlags::default(),
        random_parent_id,
    };

    let master = vec![
        def(301, ActivityKind::Random, 0, 0),
        def(501, ActivityKind::Dungeon, 601, 301),
        def(502, ActivityKind::Dungeon, 602, 301),
        def(503, ActivityKind::Dungeon, 603, 301),
    ];

    let tables = CatalogTables {
        templates: [301, 501, 502, 503]
            .into_iter()
            .map(|activity_id| TemplateRow {
                activity_id,
                x: 10.0,
                y: 20.0,
                z: 30.0,
                orientation: 0.0,
                required_item_level: 330,
            })
            .collect(),
        ..Default::default()
    };

    Catalog::build(master, tables, &HashMap::new())
}

fn tick(mgr: &mut LfgManager, world: &mut World, sink: &mut LogSink, ms: u32) {
    world.now += i64::from(ms) / 1000;
    mgr.update(world, sink, ms);
}

fn run_solo(mgr: &mut LfgManager, world: &mut World, sink: &mut LogSink) {
    info!("--- scenario: solo random join ---");
    world.add_player(PlayerId(1), Class::Paladin, 85, 380);

    let available = mgr.catalog().available_activity_ids(world, 85, 4);
    info!(available = ?available, "finder offerings for the paladin");

    let selection: BTreeSet<u32> = [301].into_iter().collect();
    mgr.process_join(world, sink, PlayerId(1), &selection, RoleMask(ROLE_TANK));

    for _ in 0..3 {
        tick(mgr, world, sink, 5_000);
    }

    mgr.process_leave(world, sink, 0, RequesterId::Player(PlayerId(1)));
}

fn run_party(mgr: &mut LfgManager, world: &mut World, sink: &mut LogSink) {
    info!("--- scenario: party role check ---");
    let classes = [
        Class::Warrior,
        Class::Priest,
        Class::Mage,
        Class::Rogue,
        Class::Hunter,
    ];
    let members: Vec<PlayerId> = (10..15).map(PlayerId).collect();
    for (player, class) in members.iter().zip(classes) {
        world.add_player(*player, class, 85, 360);
    }
    world.form_group(GroupId(100), members[0], &members);

    let selection: BTreeSet<u32> = [501].into_iter().collect();
    mgr.process_join(world, sink, members[0], &selection, RoleMask(ROLE_TANK));

    let picks = [ROLE_HEAL, ROLE_DAMAGE, ROLE_DAMAGE, ROLE_DAMAGE];
    for (player, roles) in members[1..].iter().zip(picks) {
        mgr.process_role_selection(world, sink, GroupId(100), *player, RoleMask(roles));
    }

    tick(mgr, world, sink, 5_000);
}

fn run_timeout(mgr: &mut LfgManager, world: &mut World, sink: &mut LogSink) {
    info!("--- scenario: role check timeout ---");
    let members: Vec<PlayerId> = (20..25).map(PlayerId).collect();
    for player in &members {
        world.add_player(*player, Class::Druid, 85, 360);
    }
    world.form_group(GroupId(200), members[0], &members);

    let selection: BTreeSet<u32> = [502].into_iter().collect();
    mgr.process_join(world, sink, members[0], &selection, RoleMask(ROLE_TANK));
    mgr.process_role_selection(
        world,
        sink,
        GroupId(200),
        members[1],
        RoleMask(ROLE_HEAL),
    );

    // Nobody else answers; two minutes of frames expire the check.
    for _ in 0..24 {
        tick(mgr, world, sink, 5_000);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lfg_refs=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();
    let mut world = World::default();
    let mut sink = LogSink;
    let mut mgr = LfgManager::new(demo_catalog()?);

    match cfg.scenario.as_str() {
        "solo" => run_solo(&mut mgr, &mut world, &mut sink),
        "party" => run_party(&mut mgr, &mut world, &mut sink),
        "timeout" => run_timeout(&mut mgr, &mut world, &mut sink),
        "all" => {
            run_solo(&mut mgr, &mut world, &mut sink);
            run_party(&mut mgr, &mut world, &mut sink);
            run_timeout(&mut mgr, &mut world, &mut sink);
        }
        _ => usage_and_exit(),
    }

    Ok(())
}
