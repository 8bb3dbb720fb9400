//! Join orchestration, the ticket registry and role checks.
//!
//! One `LfgManager` lives for the whole server run, constructed at boot
//! with the loaded catalog. The host calls the `process_*` entry points
//! from its request handlers and `update` once per frame; nothing here
//! suspends or retries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, error, warn};

use lfgproto::codes::{JoinResult, RoleCheckState, UpdateReason};
use lfgproto::ids::{GroupId, PlayerId, RequesterId, RoleMask};
use lfgproto::msg::{
    JoinResultMsg, LockSlot, MemberRoles, PlayerLocks, QueueStatusMsg, RideTicket,
    RoleCheckUpdateMsg, RoleChosenMsg, StatusUpdateMsg,
};
use lfgproto::slot::SlotCode;

use crate::catalog::{ActivityKind, Catalog};
use crate::host::HostApi;
use crate::locks::{lock_map_for, LockDetail};
use crate::notify::NotificationSink;
use crate::queue::{LfgQueue, QueueEntry};
use crate::roles::{is_role_set_valid, mask_invalid_for_class};
use crate::{
    MAX_COMMENT_LEN, MAX_GROUP_SIZE, NEEDED_DAMAGE, NEEDED_HEALERS, NEEDED_TANKS,
    QUEUE_UPDATE_INTERVAL_MS, ROLE_CHECK_TIME_LIMIT_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemberRole {
    pub roles: RoleMask,
    pub confirmed: bool,
}

/// Prepared queue data for one requester, alive from join acceptance until
/// leave, role-check failure or ticket removal.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Catalogued activity ids after random expansion and lock pruning.
    pub resolved_activities: Vec<u32>,
    /// Non-zero iff the user picked a random activity.
    pub random_activity_id: u32,
    pub members: HashMap<PlayerId, MemberRole>,
}

impl JoinRequest {
    pub fn is_party(&self) -> bool {
        self.members.len() > 1
    }

    pub fn all_confirmed(&self) -> bool {
        self.members.values().all(|m| m.confirmed)
    }

    /// Member ids in a stable order for notification fan-out.
    pub fn member_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.members.keys().copied().collect();
        ids.sort();
        ids
    }
}

type MemberLockMaps = Vec<(PlayerId, HashMap<SlotCode, LockDetail>)>;

pub struct LfgManager {
    catalog: Catalog,
    join_data: HashMap<RequesterId, JoinRequest>,
    role_check_timers: HashMap<GroupId, i64>,
    queue_entries: BTreeMap<u32, QueueEntry>,
    queue: LfgQueue,
    next_ticket_id: u32,
    queue_update_in: i64,
}

impl LfgManager {
    pub fn new(catalog: Catalog) -> LfgManager {
        LfgManager {
            catalog,
            join_data: HashMap::new(),
            role_check_timers: HashMap::new(),
            queue_entries: BTreeMap::new(),
            queue: LfgQueue::default(),
            next_ticket_id: 0,
            queue_update_in: QUEUE_UPDATE_INTERVAL_MS,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn join_request(&self, requester: RequesterId) -> Option<&JoinRequest> {
        self.join_data.get(&requester)
    }

    pub fn queue_entry(&self, ticket_id: u32) -> Option<&QueueEntry> {
        self.queue_entries.get(&ticket_id)
    }

    pub fn role_check_active(&self, group: GroupId) -> bool {
        self.role_check_timers.contains_key(&group)
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Called by the instance subsystem once a matched group starts running
    /// an activity; the entry then survives a leave.
    pub fn mark_instance_started(&mut self, ticket_id: u32, activity_id: u32) {
        if let Some(entry) = self.queue_entries.get_mut(&ticket_id) {
            entry.current_activity_id = activity_id;
            entry.instance_completed = false;
        }
    }

    pub fn mark_instance_completed(&mut self, ticket_id: u32) {
        if let Some(entry) = self.queue_entries.get_mut(&ticket_id) {
            entry.instance_completed = true;
        }
    }

    /// Raid-browser comment, echoed back in status updates. Bounded to
    /// `MAX_COMMENT_LEN` bytes; longer input is cut at a char boundary.
    pub fn set_comment(&mut self, ticket_id: u32, mut comment: String) {
        if comment.len() > MAX_COMMENT_LEN {
            let mut end = MAX_COMMENT_LEN;
            while !comment.is_char_boundary(end) {
                end -= 1;
            }
            comment.truncate(end);
        }
        if let Some(entry) = self.queue_entries.get_mut(&ticket_id) {
            entry.comment = comment;
        }
    }

    // ----- Request handlers

    pub fn process_join(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        player: PlayerId,
        selected: &BTreeSet<u32>,
        roles: RoleMask,
    ) {
        let Some(view) = host.player(player) else {
            warn!(player = player.0, "join request from a player the host does not know");
            return;
        };

        let requester = match view.group {
            Some(group) => RequesterId::Group(group),
            None => RequesterId::Player(player),
        };

        // One join request and one ticket per requester at a time.
        if self.join_data.contains_key(&requester)
            || self.queue_entries.values().any(|e| e.requester == requester)
        {
            self.send_join_result(
                host,
                sink,
                requester,
                JoinResult::JoinFailed,
                RoleCheckState::Default,
                None,
                Vec::new(),
            );
            return;
        }

        // Step 1: player and group gate checks.
        let mut result = base_join_result(host, &view, roles);

        // Step 2: validate the selection, expand a random pick.
        let mut activity_ids = BTreeSet::new();
        let mut random_activity_id = 0u32;
        if result == JoinResult::Ok {
            match self.validate_selection(selected) {
                Ok((ids, random_id)) => {
                    activity_ids = ids;
                    random_activity_id = random_id;
                }
                Err(bad) => result = bad,
            }
        }

        // Step 3: per-member lock maps; locked activities leave the
        // selection.
        let mut lock_maps: MemberLockMaps = Vec::new();
        if result == JoinResult::Ok {
            let members = match view.group {
                Some(group) => host.group_members(group),
                None => vec![player],
            };
            for member in members {
                let Some(member_view) = host.player(member) else {
                    continue;
                };
                lock_maps.push((
                    member,
                    lock_map_for(host, member, &member_view, &self.catalog, &activity_ids),
                ));
            }

            for (_, locks) in &lock_maps {
                for slot in locks.keys() {
                    activity_ids.remove(&slot.activity_id());
                }
            }

            // A lock on a hand-picked activity fails the whole request, as
            // does ending up with nothing to queue for.
            for (_, locks) in &lock_maps {
                if activity_ids.is_empty() || (random_activity_id == 0 && !locks.is_empty()) {
                    result = JoinResult::NotMeetRequirements;
                    break;
                }
            }
        }

        if result != JoinResult::Ok {
            self.send_join_result(
                host,
                sink,
                requester,
                result,
                RoleCheckState::Default,
                None,
                lock_maps,
            );
            return;
        }

        // Step 4: commit. The initiator carries the leader bit and counts
        // as confirmed from the start.
        let mut members = HashMap::new();
        if let Some(group) = view.group {
            for member in host.group_members(group) {
                members.insert(member, MemberRole::default());
            }
        }
        members.insert(
            player,
            MemberRole {
                roles: roles.with_leader(),
                confirmed: true,
            },
        );

        self.join_data.insert(
            requester,
            JoinRequest {
                resolved_activities: activity_ids.into_iter().collect(),
                random_activity_id,
                members,
            },
        );

        match requester {
            RequesterId::Player(_) => {
                let ticket = self.generate_ticket(host, requester);
                self.send_join_result(
                    host,
                    sink,
                    requester,
                    JoinResult::Ok,
                    RoleCheckState::Default,
                    Some(ticket),
                    Vec::new(),
                );
                self.add_ticket_to_queue(host, sink, ticket);
            }
            RequesterId::Group(group) => {
                self.role_check_timers
                    .insert(group, ROLE_CHECK_TIME_LIMIT_MS);
                self.send_role_check_update(
                    host,
                    sink,
                    requester,
                    RoleCheckState::Initializing,
                    true,
                );
            }
        }
    }

    /// Leave requests always succeed; there is nothing to report back.
    pub fn process_leave(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        ticket_id: u32,
        requester: RequesterId,
    ) {
        if let Some(group) = requester.as_group() {
            if self.role_check_timers.contains_key(&group) {
                self.cancel_role_check(host, sink, group);
                return;
            }
        }

        if let Some(entry) = self.queue_entries.get(&ticket_id) {
            if entry.requester != requester {
                debug!(ticket_id, "leave request for a ticket the requester does not own");
                return;
            }
            let erase = !entry.retains_instance();
            self.remove_ticket_from_queue(host, sink, ticket_id, erase);
        }
    }

    pub fn process_role_selection(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        group: GroupId,
        player: PlayerId,
        roles: RoleMask,
    ) {
        if let Some(view) = host.player(player) {
            if mask_invalid_for_class(view.class, roles) {
                error!(
                    player = player.0,
                    roles = roles.0,
                    "player picked roles not available to their class, possible cheater"
                );
                return;
            }
        }

        let requester = RequesterId::Group(group);
        let Some(request) = self.join_data.get_mut(&requester) else {
            return;
        };
        let Some(member) = request.members.get_mut(&player) else {
            debug!(
                player = player.0,
                group = group.0,
                "role selection from a player outside the role check"
            );
            return;
        };
        member.roles = roles;
        member.confirmed = true;
        self.send_role_chosen(host, sink, requester, player, roles);

        // Opting out of every role kills the whole check.
        if roles.is_empty() {
            self.fail_role_check(host, sink, group, RoleCheckState::NoRole);
            return;
        }

        let Some(request) = self.join_data.get(&requester) else {
            return;
        };
        if !request.all_confirmed() {
            self.send_role_check_update(host, sink, requester, RoleCheckState::Initializing, false);
            return;
        }

        let masks: Vec<RoleMask> = request.members.values().map(|m| m.roles).collect();
        if !is_role_set_valid(&masks, NEEDED_DAMAGE, NEEDED_TANKS, NEEDED_HEALERS) {
            self.fail_role_check(host, sink, group, RoleCheckState::WrongRoles);
            return;
        }

        self.send_role_check_update(host, sink, requester, RoleCheckState::Finished, false);
        self.role_check_timers.remove(&group);
        let ticket = self.generate_ticket(host, requester);
        self.add_ticket_to_queue(host, sink, ticket);
    }

    /// Advances role-check timers and the queue interval by `diff` ms.
    /// Expirations are handled before the queue update.
    pub fn update(&mut self, host: &dyn HostApi, sink: &mut dyn NotificationSink, diff_ms: u32) {
        let mut expired = Vec::new();
        for (group, remaining) in self.role_check_timers.iter_mut() {
            *remaining -= i64::from(diff_ms);
            if *remaining <= 0 {
                expired.push(*group);
            }
        }
        for group in expired {
            self.fail_role_check(host, sink, group, RoleCheckState::MissingRole);
        }

        self.queue_update_in -= i64::from(diff_ms);
        if self.queue_update_in <= 0 {
            self.queue_update_in = QUEUE_UPDATE_INTERVAL_MS;

            let candidates =
                self.queue
                    .update(&mut self.queue_entries, &self.join_data, host.now_unix());
            for candidate in &candidates {
                debug!(
                    activity_id = candidate.activity_id,
                    tickets = ?candidate.tickets,
                    "assembled a candidate match"
                );
            }

            let flagged: Vec<u32> = self
                .queue_entries
                .iter()
                .filter(|(_, entry)| entry.needs_status_push)
                .map(|(id, _)| *id)
                .collect();
            for ticket_id in flagged {
                self.send_queue_status(host, sink, ticket_id);
                if let Some(entry) = self.queue_entries.get_mut(&ticket_id) {
                    entry.needs_status_push = false;
                }
            }
        }
    }

    // ----- Internal helpers

    /// Drops uncatalogued picks, classifies what is left, and substitutes a
    /// random pick with its pre-computed expansion.
    fn validate_selection(
        &self,
        selected: &BTreeSet<u32>,
    ) -> Result<(BTreeSet<u32>, u32), JoinResult> {
        let mut ids: BTreeSet<u32> = selected
            .iter()
            .copied()
            .filter(|id| self.catalog.get(*id).is_some())
            .collect();
        if ids.is_empty() {
            return Err(JoinResult::InternalError);
        }

        let mut has_dungeon = false;
        let mut has_raid = false;
        let mut random_activity_id = 0u32;

        for &id in &ids {
            let Some(entry) = self.catalog.get(id) else {
                continue;
            };
            match entry.def.kind {
                ActivityKind::Dungeon => has_dungeon = true,
                ActivityKind::Raid => has_raid = true,
                ActivityKind::Random => {
                    // A random pick stands alone.
                    if ids.len() > 1 {
                        return Err(JoinResult::InternalError);
                    }
                    random_activity_id = id;
                }
                _ => return Err(JoinResult::InternalError),
            }
        }

        let categories = [has_dungeon, has_raid, random_activity_id != 0]
            .into_iter()
            .filter(|present| *present)
            .count();
        if categories > 1 {
            return Err(JoinResult::MixedRaidAndDungeon);
        }

        if random_activity_id != 0 {
            ids = self.catalog.expansion(random_activity_id);
        }

        Ok((ids, random_activity_id))
    }

    fn generate_ticket(&mut self, host: &dyn HostApi, requester: RequesterId) -> RideTicket {
        // The id space outlives any realistic uptime; running out means
        // something upstream went very wrong.
        assert!(
            self.next_ticket_id != u32::MAX,
            "ticket id space exhausted"
        );
        let id = self.next_ticket_id;
        self.next_ticket_id += 1;
        RideTicket::new(id, host.now_unix() as i32, requester)
    }

    fn add_ticket_to_queue(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        ticket: RideTicket,
    ) {
        self.queue_entries.insert(ticket.id, QueueEntry::new(ticket));
        self.send_status_update(host, sink, ticket.id, UpdateReason::JoinQueueInitial);

        self.queue.add(ticket.id, host.now_unix());
        self.send_status_update(host, sink, ticket.id, UpdateReason::AddedToQueue);
    }

    fn remove_ticket_from_queue(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        ticket_id: u32,
        erase_player_data: bool,
    ) {
        let Some(entry) = self.queue_entries.get(&ticket_id) else {
            return;
        };
        let requester = entry.requester;

        self.queue.remove(ticket_id);
        self.send_status_update(host, sink, ticket_id, UpdateReason::RemovedFromQueue);

        if erase_player_data {
            self.join_data.remove(&requester);
            self.queue_entries.remove(&ticket_id);
        }
    }

    fn cancel_role_check(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        group: GroupId,
    ) {
        let requester = RequesterId::Group(group);
        self.send_role_check_update(host, sink, requester, RoleCheckState::Aborted, false);
        self.join_data.remove(&requester);
        self.role_check_timers.remove(&group);
    }

    /// Terminal role-check failure: the leader learns why the join died,
    /// the party sees the terminal state, and everything is purged.
    fn fail_role_check(
        &mut self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        group: GroupId,
        state: RoleCheckState,
    ) {
        let requester = RequesterId::Group(group);
        self.send_join_result(
            host,
            sink,
            requester,
            JoinResult::RolecheckFailed,
            state,
            None,
            Vec::new(),
        );
        self.send_role_check_update(host, sink, requester, state, false);
        self.join_data.remove(&requester);
        self.role_check_timers.remove(&group);
    }

    // ----- Notification builders

    /// The slot list a request advertises: the random slot alone, or every
    /// selected activity.
    fn request_slots(&self, request: &JoinRequest) -> Vec<SlotCode> {
        if request.random_activity_id != 0 {
            return self
                .catalog
                .get(request.random_activity_id)
                .map(|entry| vec![entry.def.slot()])
                .unwrap_or_default();
        }
        request
            .resolved_activities
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .map(|entry| entry.def.slot())
            .collect()
    }

    fn send_join_result(
        &self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        requester: RequesterId,
        result: JoinResult,
        detail: RoleCheckState,
        ticket: Option<RideTicket>,
        lock_maps: MemberLockMaps,
    ) {
        let blacklist = lock_maps
            .into_iter()
            .map(|(player, locks)| {
                let mut slots: Vec<LockSlot> = locks
                    .into_iter()
                    .map(|(slot, detail)| LockSlot {
                        slot,
                        reason: detail.reason,
                        required: detail.required,
                        current: detail.current,
                    })
                    .collect();
                slots.sort_by_key(|lock| lock.slot);
                PlayerLocks { player, slots }
            })
            .collect();

        let msg = JoinResultMsg {
            result,
            detail,
            ticket,
            blacklist,
        };

        // Join results go to the leader only.
        let recipient = match requester {
            RequesterId::Player(player) => Some(player),
            RequesterId::Group(group) => host.group_leader(group),
        };
        if let Some(player) = recipient {
            if host.player(player).is_some() {
                sink.join_result(player, &msg);
            }
        }
    }

    fn send_status_update(
        &self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        ticket_id: u32,
        reason: UpdateReason,
    ) {
        let Some(entry) = self.queue_entries.get(&ticket_id) else {
            return;
        };
        let Some(request) = self.join_data.get(&entry.requester) else {
            warn!(ticket_id, "status update for a ticket without join data");
            return;
        };

        let (joined, queued) = match reason {
            UpdateReason::JoinQueueInitial => (true, false),
            UpdateReason::JoinQueue | UpdateReason::AddedToQueue => (true, true),
            _ => (false, false),
        };

        let msg = StatusUpdateMsg {
            ticket: entry.ticket,
            reason,
            is_party: request.is_party(),
            joined,
            lfg_joined: reason != UpdateReason::RemovedFromQueue,
            queued,
            comment: entry.comment.clone(),
            slots: self.request_slots(request),
        };

        for member in request.member_ids() {
            if host.player(member).is_some() {
                sink.status_update(member, &msg);
            }
        }
    }

    fn send_role_check_update(
        &self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        requester: RequesterId,
        state: RoleCheckState,
        is_beginning: bool,
    ) {
        let Some(request) = self.join_data.get(&requester) else {
            return;
        };

        let members = request
            .member_ids()
            .into_iter()
            .map(|player| {
                let member = request.members[&player];
                MemberRoles {
                    player,
                    roles: member.roles,
                    confirmed: member.confirmed,
                }
            })
            .collect();

        let msg = RoleCheckUpdateMsg {
            state,
            is_beginning,
            slots: self.request_slots(request),
            members,
        };

        for member in request.member_ids() {
            if host.player(member).is_some() {
                sink.role_check_update(member, &msg);
            }
        }
    }

    fn send_role_chosen(
        &self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        requester: RequesterId,
        player: PlayerId,
        roles: RoleMask,
    ) {
        let Some(request) = self.join_data.get(&requester) else {
            return;
        };
        let msg = RoleChosenMsg {
            player,
            roles,
            accepted: !roles.is_empty(),
        };
        for member in request.member_ids() {
            if host.player(member).is_some() {
                sink.role_chosen(member, &msg);
            }
        }
    }

    fn send_queue_status(
        &self,
        host: &dyn HostApi,
        sink: &mut dyn NotificationSink,
        ticket_id: u32,
    ) {
        let Some(entry) = self.queue_entries.get(&ticket_id) else {
            return;
        };
        let Some(request) = self.join_data.get(&entry.requester) else {
            return;
        };
        let Some(stats) = self.queue.stats_for(ticket_id, host.now_unix()) else {
            return;
        };

        let msg = QueueStatusMsg {
            ticket: entry.ticket,
            time_in_queue: stats.time_in_queue,
            avg_wait: stats.avg_wait,
            avg_wait_by_role: stats.avg_wait_by_role,
            needed_roles: stats.needed_roles,
        };

        for member in request.member_ids() {
            if host.player(member).is_some() {
                sink.queue_status(member, &msg);
            }
        }
    }
}

/// Gate checks that do not depend on the dungeon selection. The first
/// failing condition decides the result.
fn base_join_result(host: &dyn HostApi, view: &crate::host::PlayerView, roles: RoleMask) -> JoinResult {
    if !view.can_join_dungeon_finder {
        return JoinResult::InternalError;
    }
    if mask_invalid_for_class(view.class, roles) {
        return JoinResult::InternalError;
    }
    if view.in_battleground || view.in_arena || view.in_battleground_queue {
        return JoinResult::UsingBattleground;
    }
    if view.has_deserter_debuff {
        return JoinResult::Deserter;
    }
    if view.has_random_cooldown {
        return JoinResult::RandomCooldown;
    }
    if view.gm_frozen {
        return JoinResult::InternalError;
    }

    let Some(group) = view.group else {
        return JoinResult::Ok;
    };

    let total = host.group_size(group);
    if total > MAX_GROUP_SIZE {
        return JoinResult::TooManyMembers;
    }

    let members = host.group_members(group);
    for member in &members {
        let Some(member_view) = host.player(*member) else {
            continue;
        };
        if !member_view.can_join_dungeon_finder {
            return JoinResult::InternalError;
        }
        if member_view.in_battleground
            || member_view.in_arena
            || member_view.in_battleground_queue
        {
            return JoinResult::UsingBattleground;
        }
        if member_view.has_deserter_debuff {
            return JoinResult::Deserter;
        }
        if member_view.has_random_cooldown {
            return JoinResult::RandomCooldown;
        }
        if member_view.gm_frozen {
            return JoinResult::InternalError;
        }
    }

    if members.len() as u8 != total {
        return JoinResult::Disconnected;
    }

    JoinResult::Ok
}
