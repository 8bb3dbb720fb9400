//! Outbound notification capability.
//!
//! The core is network-agnostic: it hands finished payloads to this sink,
//! addressed per recipient, and assumes delivery is best-effort and
//! non-blocking. The session layer owns the actual encoding and transport.

use lfgproto::ids::PlayerId;
use lfgproto::msg::{
    JoinResultMsg, QueueStatusMsg, RoleCheckUpdateMsg, RoleChosenMsg, StatusUpdateMsg,
};

pub trait NotificationSink {
    fn join_result(&mut self, to: PlayerId, msg: &JoinResultMsg);
    fn status_update(&mut self, to: PlayerId, msg: &StatusUpdateMsg);
    fn role_check_update(&mut self, to: PlayerId, msg: &RoleCheckUpdateMsg);
    fn role_chosen(&mut self, to: PlayerId, msg: &RoleChosenMsg);
    fn queue_status(&mut self, to: PlayerId, msg: &QueueStatusMsg);
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Sent {
        JoinResult(PlayerId, JoinResultMsg),
        StatusUpdate(PlayerId, StatusUpdateMsg),
        RoleCheckUpdate(PlayerId, RoleCheckUpdateMsg),
        RoleChosen(PlayerId, RoleChosenMsg),
        QueueStatus(PlayerId, QueueStatusMsg),
    }

    /// Captures every emitted message in order.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub sent: Vec<Sent>,
    }

    impl RecordingSink {
        pub fn clear(&mut self) {
            self.sent.clear();
        }
    }

    impl NotificationSink for RecordingSink {
        fn join_result(&mut self, to: PlayerId, msg: &JoinResultMsg) {
            self.sent.push(Sent::JoinResult(to, msg.clone()));
        }

        fn status_update(&mut self, to: PlayerId, msg: &StatusUpdateMsg) {
            self.sent.push(Sent::StatusUpdate(to, msg.clone()));
        }

        fn role_check_update(&mut self, to: PlayerId, msg: &RoleCheckUpdateMsg) {
            self.sent.push(Sent::RoleCheckUpdate(to, msg.clone()));
        }

        fn role_chosen(&mut self, to: PlayerId, msg: &RoleChosenMsg) {
            self.sent.push(Sent::RoleChosen(to, *msg));
        }

        fn queue_status(&mut self, to: PlayerId, msg: &QueueStatusMsg) {
            self.sent.push(Sent::QueueStatus(to, *msg));
        }
    }
}
