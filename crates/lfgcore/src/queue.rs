//! Queued tickets and the periodic matchmaking pass.
//!
//! The scheduler never talks to the outside world: the manager drives it on
//! the 5-second interval, takes the candidate matches it assembled, and
//! pushes queue-status messages for every entry the pass flagged.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::warn;

use lfgproto::ids::{RequesterId, RoleMask, ROLE_DAMAGE, ROLE_HEAL, ROLE_TANK};
use lfgproto::msg::RideTicket;

use crate::manager::JoinRequest;
use crate::roles::is_role_set_valid;
use crate::{MAX_GROUP_SIZE, NEEDED_DAMAGE, NEEDED_HEALERS, NEEDED_TANKS};

/// Registry-side state of one queued requester.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub ticket: RideTicket,
    pub requester: RequesterId,
    /// Activity id of the instance the requester's group is currently
    /// running, if any.
    pub current_activity_id: u32,
    pub comment: String,
    pub instance_completed: bool,
    pub needs_status_push: bool,
}

impl QueueEntry {
    pub fn new(ticket: RideTicket) -> QueueEntry {
        QueueEntry {
            ticket,
            requester: ticket.requester,
            current_activity_id: 0,
            comment: String::new(),
            instance_completed: false,
            needs_status_push: true,
        }
    }

    /// An entry with a live instance keeps its data across a leave.
    pub fn retains_instance(&self) -> bool {
        self.current_activity_id != 0 && !self.instance_completed
    }
}

/// A set of tickets that together fill a 1/1/3 party for one activity.
/// Handed to the group-forming subsystem; the queue itself does not act on
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMatch {
    pub activity_id: u32,
    pub tickets: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
struct QueuedTicket {
    joined_unix: i64,
    needed: [u8; 3], // tank, heal, damage
}

/// Point-in-time numbers for one ticket's queue-status message.
#[derive(Debug, Clone, Copy)]
pub struct QueueStats {
    pub time_in_queue: u32,
    pub avg_wait: u32,
    pub avg_wait_by_role: [u32; 3],
    pub needed_roles: [u8; 3],
}

#[derive(Debug, Default)]
pub struct LfgQueue {
    queued: BTreeMap<u32, QueuedTicket>,
    avg_wait: u32,
    avg_wait_by_role: [u32; 3],
}

/// How many of the default party's slots this selection still leaves open,
/// counting confirmed members only. Hybrids greedily take the scarcest slot
/// they can fill (tank, then heal, then damage).
fn remaining_needed(masks: &[RoleMask]) -> [u8; 3] {
    let mut need = [NEEDED_TANKS, NEEDED_HEALERS, NEEDED_DAMAGE];
    for mask in masks {
        let m = mask.needed();
        if m == 0 {
            continue;
        }
        let idx = if m == ROLE_TANK {
            0
        } else if m == ROLE_HEAL {
            1
        } else if m == ROLE_DAMAGE {
            2
        } else if m & ROLE_TANK != 0 && need[0] > 0 {
            0
        } else if m & ROLE_HEAL != 0 && need[1] > 0 {
            1
        } else {
            2
        };
        need[idx] = need[idx].saturating_sub(1);
    }
    need
}

impl LfgQueue {
    pub fn add(&mut self, ticket_id: u32, now_unix: i64) {
        self.queued.insert(
            ticket_id,
            QueuedTicket {
                joined_unix: now_unix,
                needed: [NEEDED_TANKS, NEEDED_HEALERS, NEEDED_DAMAGE],
            },
        );
    }

    pub fn remove(&mut self, ticket_id: u32) {
        self.queued.remove(&ticket_id);
    }

    pub fn contains(&self, ticket_id: u32) -> bool {
        self.queued.contains_key(&ticket_id)
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// One matchmaking pass. Refreshes per-ticket needed-role counts and the
    /// wait aggregates, assembles candidate matches per shared activity in
    /// ticket order, and flags every queued entry for a status push.
    pub fn update(
        &mut self,
        entries: &mut BTreeMap<u32, QueueEntry>,
        join_data: &HashMap<RequesterId, JoinRequest>,
        now_unix: i64,
    ) -> Vec<CandidateMatch> {
        let mut wait_sum = 0i64;
        let mut wait_count = 0u32;
        let mut role_sum = [0i64; 3];
        let mut role_count = [0u32; 3];

        // Per-activity assembly state: the tickets gathered so far and the
        // role masks each contributes.
        let mut assembly: HashMap<u32, Vec<(u32, Vec<RoleMask>)>> = HashMap::new();
        let mut matched: HashSet<u32> = HashSet::new();
        let mut candidates = Vec::new();

        let ticket_ids: Vec<u32> = self.queued.keys().copied().collect();
        for ticket_id in ticket_ids {
            let Some(entry) = entries.get_mut(&ticket_id) else {
                warn!(ticket_id, "queued ticket has no registry entry, dropping");
                self.queued.remove(&ticket_id);
                continue;
            };
            let Some(request) = join_data.get(&entry.requester) else {
                continue;
            };

            let confirmed: Vec<RoleMask> = request
                .members
                .values()
                .filter(|m| m.confirmed)
                .map(|m| m.roles)
                .collect();

            let Some(queued) = self.queued.get_mut(&ticket_id) else {
                continue;
            };
            queued.needed = remaining_needed(&confirmed);
            let waited = (now_unix - queued.joined_unix).max(0);

            wait_sum += waited;
            wait_count += 1;
            for (idx, bit) in [ROLE_TANK, ROLE_HEAL, ROLE_DAMAGE].into_iter().enumerate() {
                if confirmed.iter().any(|m| m.contains(bit)) {
                    role_sum[idx] += waited;
                    role_count[idx] += 1;
                }
            }

            if entry.retains_instance() || matched.contains(&ticket_id) {
                entry.needs_status_push = true;
                continue;
            }

            for &activity_id in &request.resolved_activities {
                if matched.contains(&ticket_id) {
                    break;
                }
                let slots = assembly.entry(activity_id).or_default();
                // Tickets claimed by a completed candidate elsewhere are
                // stale here.
                slots.retain(|(t, _)| !matched.contains(t));

                let gathered: usize = slots.iter().map(|(_, masks)| masks.len()).sum();
                if gathered + confirmed.len() > usize::from(MAX_GROUP_SIZE) {
                    continue;
                }
                let mut trial: Vec<RoleMask> = slots
                    .iter()
                    .flat_map(|(_, masks)| masks.iter().copied())
                    .collect();
                trial.extend_from_slice(&confirmed);
                if !is_role_set_valid(&trial, NEEDED_DAMAGE, NEEDED_TANKS, NEEDED_HEALERS) {
                    continue;
                }
                slots.push((ticket_id, confirmed.clone()));

                if trial.len() == usize::from(MAX_GROUP_SIZE) {
                    for (t, _) in slots.iter() {
                        matched.insert(*t);
                    }
                    candidates.push(CandidateMatch {
                        activity_id,
                        tickets: slots.iter().map(|(t, _)| *t).collect(),
                    });
                    slots.clear();
                }
            }

            entry.needs_status_push = true;
        }

        self.avg_wait = if wait_count > 0 {
            (wait_sum / i64::from(wait_count)) as u32
        } else {
            0
        };
        for idx in 0..3 {
            self.avg_wait_by_role[idx] = if role_count[idx] > 0 {
                (role_sum[idx] / i64::from(role_count[idx])) as u32
            } else {
                0
            };
        }

        candidates
    }

    pub fn stats_for(&self, ticket_id: u32, now_unix: i64) -> Option<QueueStats> {
        let queued = self.queued.get(&ticket_id)?;
        Some(QueueStats {
            time_in_queue: (now_unix - queued.joined_unix).max(0) as u32,
            avg_wait: self.avg_wait,
            avg_wait_by_role: self.avg_wait_by_role,
            needed_roles: queued.needed,
        })
    }
}
