//! Requester identities and role masks.

pub const ROLE_LEADER: u8 = 0x1;
pub const ROLE_TANK: u8 = 0x2;
pub const ROLE_HEAL: u8 = 0x4;
pub const ROLE_DAMAGE: u8 = 0x8;
pub const ROLE_MASK_NEEDED: u8 = ROLE_TANK | ROLE_HEAL | ROLE_DAMAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

/// The entity a join request is booked under. A solo player queues under
/// their own id, a party queues under the group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequesterId {
    Player(PlayerId),
    Group(GroupId),
}

impl RequesterId {
    pub const KIND_PLAYER: u8 = 0x01;
    pub const KIND_GROUP: u8 = 0x02;
    pub const LEN: usize = 9; // kind byte + u64

    pub fn kind(self) -> u8 {
        match self {
            RequesterId::Player(_) => Self::KIND_PLAYER,
            RequesterId::Group(_) => Self::KIND_GROUP,
        }
    }

    pub fn raw(self) -> u64 {
        match self {
            RequesterId::Player(p) => p.0,
            RequesterId::Group(g) => g.0,
        }
    }

    pub fn from_parts(kind: u8, raw: u64) -> Option<Self> {
        match kind {
            Self::KIND_PLAYER => Some(RequesterId::Player(PlayerId(raw))),
            Self::KIND_GROUP => Some(RequesterId::Group(GroupId(raw))),
            _ => None,
        }
    }

    pub fn as_player(self) -> Option<PlayerId> {
        match self {
            RequesterId::Player(p) => Some(p),
            RequesterId::Group(_) => None,
        }
    }

    pub fn as_group(self) -> Option<GroupId> {
        match self {
            RequesterId::Player(_) => None,
            RequesterId::Group(g) => Some(g),
        }
    }
}

/// Bitset over leader/tank/heal/damage. The leader bit is bookkeeping only;
/// party composition cares about the needed bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleMask(pub u8);

impl RoleMask {
    pub const EMPTY: RoleMask = RoleMask(0);

    pub fn contains(self, bits: u8) -> bool {
        self.0 & bits != 0
    }

    pub fn needed(self) -> u8 {
        self.0 & ROLE_MASK_NEEDED
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn with_leader(self) -> RoleMask {
        RoleMask(self.0 | ROLE_LEADER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requester_round_trips_through_parts() {
        let p = RequesterId::Player(PlayerId(42));
        let g = RequesterId::Group(GroupId(7));
        assert_eq!(RequesterId::from_parts(p.kind(), p.raw()), Some(p));
        assert_eq!(RequesterId::from_parts(g.kind(), g.raw()), Some(g));
        assert_eq!(RequesterId::from_parts(0x7f, 1), None);
    }

    #[test]
    fn role_mask_needed_strips_leader_bit() {
        let m = RoleMask(ROLE_LEADER | ROLE_TANK);
        assert_eq!(m.needed(), ROLE_TANK);
        assert!(!m.is_empty());
        assert!(RoleMask::EMPTY.is_empty());
    }
}
