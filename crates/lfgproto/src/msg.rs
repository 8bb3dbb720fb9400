//! Request and notification payloads.
//!
//! Payload layout: first byte is the message type, remaining bytes are
//! big-endian fields. Variable-length lists carry a u8 count; the comment
//! string carries a u16 byte length and is cut at that limit.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codes::{JoinResult, LockKind, RoleCheckState, UpdateReason};
use crate::ids::{GroupId, PlayerId, RequesterId, RoleMask};
use crate::slot::SlotCode;
use crate::ProtoError;

pub const REQ_JOIN: u8 = 0x01;
pub const REQ_LEAVE: u8 = 0x02;
pub const REQ_SET_ROLES: u8 = 0x03;

pub const EVT_JOIN_RESULT: u8 = 0x81;
pub const EVT_UPDATE_STATUS: u8 = 0x82;
pub const EVT_ROLE_CHECK_UPDATE: u8 = 0x83;
pub const EVT_ROLE_CHOSEN: u8 = 0x84;
pub const EVT_QUEUE_STATUS: u8 = 0x85;

/// Queue handle handed to the client. `ticket_type` is a fixed sniffed
/// value; the client rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RideTicket {
    pub id: u32,
    pub ticket_type: u32,
    pub time: i32,
    pub requester: RequesterId,
}

impl RideTicket {
    pub const TICKET_TYPE: u32 = 3;

    pub fn new(id: u32, time: i32, requester: RequesterId) -> RideTicket {
        RideTicket {
            id,
            ticket_type: Self::TICKET_TYPE,
            time,
            requester,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSlot {
    pub slot: SlotCode,
    pub reason: LockKind,
    pub required: u32,
    pub current: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLocks {
    pub player: PlayerId,
    pub slots: Vec<LockSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResultMsg {
    pub result: JoinResult,
    pub detail: RoleCheckState,
    pub ticket: Option<RideTicket>,
    pub blacklist: Vec<PlayerLocks>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdateMsg {
    pub ticket: RideTicket,
    pub reason: UpdateReason,
    pub is_party: bool,
    pub joined: bool,
    pub lfg_joined: bool,
    pub queued: bool,
    pub comment: String,
    pub slots: Vec<SlotCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRoles {
    pub player: PlayerId,
    pub roles: RoleMask,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCheckUpdateMsg {
    pub state: RoleCheckState,
    pub is_beginning: bool,
    pub slots: Vec<SlotCode>,
    pub members: Vec<MemberRoles>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChosenMsg {
    pub player: PlayerId,
    pub roles: RoleMask,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatusMsg {
    pub ticket: RideTicket,
    pub time_in_queue: u32,
    pub avg_wait: u32,
    pub avg_wait_by_role: [u32; 3],
    pub needed_roles: [u8; 3],
}

/// Inbound client requests.
///
/// Encoding:
/// - `REQ_JOIN`: roles (1 byte), slot count (1 byte), slots (u32 each).
///   The low 24 bits of a slot are the activity id.
/// - `REQ_LEAVE`: ticket id (u32), requester kind (1 byte, 0 = absent),
///   requester raw id (u64).
/// - `REQ_SET_ROLES`: group id (u64), player id (u64), roles (1 byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LfgReq {
    Join {
        roles: RoleMask,
        slots: Vec<SlotCode>,
    },
    Leave {
        ticket_id: u32,
        requester: Option<RequesterId>,
    },
    SetRoles {
        group: GroupId,
        player: PlayerId,
        roles: RoleMask,
    },
}

pub fn parse_req(p: Bytes) -> Result<LfgReq, ProtoError> {
    if p.is_empty() {
        return Err(ProtoError::Truncated {
            field: "request type",
            need: 1,
            got: 0,
        });
    }

    match p[0] {
        REQ_JOIN => {
            if p.len() < 3 {
                return Err(ProtoError::Truncated {
                    field: "slot count",
                    need: 3,
                    got: p.len(),
                });
            }
            let roles = RoleMask(p[1]);
            let count = p[2] as usize;
            let need = 3 + count * 4;
            if p.len() != need {
                return Err(ProtoError::WrongLength {
                    req: "join",
                    need,
                    got: p.len(),
                });
            }
            let mut slots = Vec::with_capacity(count);
            for i in 0..count {
                let off = 3 + i * 4;
                slots.push(SlotCode(u32::from_be_bytes([
                    p[off],
                    p[off + 1],
                    p[off + 2],
                    p[off + 3],
                ])));
            }
            Ok(LfgReq::Join { roles, slots })
        }
        REQ_LEAVE => {
            let need = 1 + 4 + 1 + 8;
            if p.len() != need {
                return Err(ProtoError::WrongLength {
                    req: "leave",
                    need,
                    got: p.len(),
                });
            }
            let ticket_id = u32::from_be_bytes([p[1], p[2], p[3], p[4]]);
            let kind = p[5];
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&p[6..14]);
            let raw = u64::from_be_bytes(raw);
            let requester = if kind == 0 {
                None
            } else {
                Some(
                    RequesterId::from_parts(kind, raw)
                        .ok_or(ProtoError::BadRequesterKind(kind))?,
                )
            };
            Ok(LfgReq::Leave {
                ticket_id,
                requester,
            })
        }
        REQ_SET_ROLES => {
            let need = 1 + 8 + 8 + 1;
            if p.len() != need {
                return Err(ProtoError::WrongLength {
                    req: "set-roles",
                    need,
                    got: p.len(),
                });
            }
            let mut g = [0u8; 8];
            g.copy_from_slice(&p[1..9]);
            let mut pl = [0u8; 8];
            pl.copy_from_slice(&p[9..17]);
            Ok(LfgReq::SetRoles {
                group: GroupId(u64::from_be_bytes(g)),
                player: PlayerId(u64::from_be_bytes(pl)),
                roles: RoleMask(p[17]),
            })
        }
        t => Err(ProtoError::UnknownRequest(t)),
    }
}

fn put_ticket(buf: &mut BytesMut, t: &RideTicket) {
    buf.put_u32(t.id);
    buf.put_u32(t.ticket_type);
    buf.put_i32(t.time);
    buf.put_u8(t.requester.kind());
    buf.put_u64(t.requester.raw());
}

pub fn encode_join_result(m: &JoinResultMsg) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(EVT_JOIN_RESULT);
    buf.put_u8(m.result.as_wire());
    buf.put_u8(m.detail.as_wire());
    match &m.ticket {
        Some(t) => {
            buf.put_u8(1);
            put_ticket(&mut buf, t);
        }
        None => buf.put_u8(0),
    }
    buf.put_u8(m.blacklist.len() as u8);
    for entry in &m.blacklist {
        buf.put_u64(entry.player.0);
        buf.put_u8(entry.slots.len() as u8);
        for lock in &entry.slots {
            buf.put_u32(lock.slot.0);
            buf.put_u16(lock.reason.as_wire());
            buf.put_u32(lock.required);
            buf.put_u32(lock.current);
        }
    }
    buf.freeze()
}

pub fn encode_status_update(m: &StatusUpdateMsg) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(EVT_UPDATE_STATUS);
    put_ticket(&mut buf, &m.ticket);
    buf.put_u8(m.reason.as_wire());
    let flags = (m.is_party as u8)
        | ((m.joined as u8) << 1)
        | ((m.lfg_joined as u8) << 2)
        | ((m.queued as u8) << 3);
    buf.put_u8(flags);
    // The length prefix and the bytes that follow must agree; anything past
    // the prefix limit is cut.
    let comment = m.comment.as_bytes();
    let take = comment.len().min(usize::from(u16::MAX));
    buf.put_u16(take as u16);
    buf.put_slice(&comment[..take]);
    buf.put_u8(m.slots.len() as u8);
    for slot in &m.slots {
        buf.put_u32(slot.0);
    }
    buf.freeze()
}

pub fn encode_role_check_update(m: &RoleCheckUpdateMsg) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(EVT_ROLE_CHECK_UPDATE);
    buf.put_u8(m.state.as_wire());
    buf.put_u8(m.is_beginning as u8);
    buf.put_u8(m.slots.len() as u8);
    for slot in &m.slots {
        buf.put_u32(slot.0);
    }
    buf.put_u8(m.members.len() as u8);
    for member in &m.members {
        buf.put_u64(member.player.0);
        buf.put_u8(member.roles.0);
        buf.put_u8(member.confirmed as u8);
    }
    buf.freeze()
}

pub fn encode_role_chosen(m: &RoleChosenMsg) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(EVT_ROLE_CHOSEN);
    buf.put_u64(m.player.0);
    buf.put_u8(m.roles.0);
    buf.put_u8(m.accepted as u8);
    buf.freeze()
}

pub fn encode_queue_status(m: &QueueStatusMsg) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(EVT_QUEUE_STATUS);
    put_ticket(&mut buf, &m.ticket);
    buf.put_u32(m.time_in_queue);
    buf.put_u32(m.avg_wait);
    for wait in m.avg_wait_by_role {
        buf.put_u32(wait);
    }
    for needed in m.needed_roles {
        buf.put_u8(needed);
    }
    buf.freeze()
}
