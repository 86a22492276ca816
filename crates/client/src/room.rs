//! Per-user room membership on the push channel.
//!
//! Joining is remembered as intent: the join is sent once per open push
//! session and re-sent after every reconnect. A failed join is not retried
//! here; the next open tries again.

use labnotify_shared::{room_name, ClientCommand, UserId};

use crate::transport::PushTransport;

#[derive(Debug, Default)]
pub struct RoomCoordinator {
    /// User whose room should be joined whenever push is open.
    target: Option<UserId>,
    /// A join was sent on the current open connection.
    joined: bool,
    /// Room the server last acknowledged.
    confirmed: Option<String>,
}

impl RoomCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<UserId> {
        self.target
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn confirmed_room(&self) -> Option<&str> {
        self.confirmed.as_deref()
    }

    /// Join `user_id`'s room. Only sends when push is active and the
    /// transport is open; otherwise the intent is kept for the next open.
    pub async fn join(&mut self, user_id: UserId, link: &mut dyn PushTransport, push_active: bool) {
        if self.target != Some(user_id) {
            self.target = Some(user_id);
            self.joined = false;
        }
        if !push_active || !link.is_open() || self.joined {
            return;
        }
        self.send_join(user_id, link).await;
    }

    /// Leave the current room before a deliberate disconnect.
    pub async fn leave(&mut self, link: &mut dyn PushTransport, push_active: bool) {
        let Some(user_id) = self.target.take() else {
            return;
        };
        let was_joined = std::mem::take(&mut self.joined);
        self.confirmed = None;
        if !push_active || !link.is_open() || !was_joined {
            return;
        }
        if let Err(e) = link.send(ClientCommand::leave(user_id)).await {
            crate::log_debug!("leave for {} not delivered: {}", room_name(user_id), e);
        }
    }

    /// Push (re)entered the open state.
    pub async fn on_open(&mut self, link: &mut dyn PushTransport) {
        self.joined = false;
        self.confirmed = None;
        if let Some(user_id) = self.target {
            self.send_join(user_id, link).await;
        }
    }

    /// Push connection lost; membership must be re-established on the next open.
    pub fn on_closed(&mut self) {
        self.joined = false;
        self.confirmed = None;
    }

    pub fn on_joined(&mut self, room: Option<String>) {
        let room = room.or_else(|| self.target.map(room_name));
        crate::log_debug!("room joined: {:?}", room);
        self.confirmed = room;
    }

    pub fn on_left(&mut self, room: Option<String>) {
        if room.is_none() || room == self.confirmed {
            self.confirmed = None;
        }
    }

    async fn send_join(&mut self, user_id: UserId, link: &mut dyn PushTransport) {
        match link.send(ClientCommand::join(user_id)).await {
            Ok(()) => self.joined = true,
            Err(e) => {
                crate::log_warn!("join {} failed, will retry on reconnect: {}", room_name(user_id), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::error::{ConnectError, SendError};
    use crate::transport::TransportEvent;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        open: bool,
        fail_sends: bool,
        sent: Vec<ClientCommand>,
    }

    #[async_trait]
    impl PushTransport for Recorder {
        async fn connect(&mut self, _: &Credential, _: UserId) -> Result<(), ConnectError> {
            self.open = true;
            Ok(())
        }

        async fn next_event(&mut self) -> TransportEvent {
            std::future::pending().await
        }

        async fn send(&mut self, command: ClientCommand) -> Result<(), SendError> {
            if self.fail_sends {
                return Err(SendError("broken pipe".into()));
            }
            self.sent.push(command);
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    #[tokio::test]
    async fn join_is_deferred_until_push_is_open() {
        let mut link = Recorder::default();
        let mut room = RoomCoordinator::new();

        room.join(42, &mut link, false).await;
        assert!(link.sent.is_empty());
        assert_eq!(room.target(), Some(42));

        link.open = true;
        room.on_open(&mut link).await;
        assert_eq!(link.sent, vec![ClientCommand::join(42)]);
    }

    #[tokio::test]
    async fn one_join_per_open_session() {
        let mut link = Recorder {
            open: true,
            ..Default::default()
        };
        let mut room = RoomCoordinator::new();

        room.join(42, &mut link, true).await;
        room.join(42, &mut link, true).await;
        assert_eq!(link.sent.len(), 1);

        room.on_closed();
        room.on_open(&mut link).await;
        assert_eq!(link.sent, vec![ClientCommand::join(42), ClientCommand::join(42)]);
    }

    #[tokio::test]
    async fn failed_join_waits_for_next_open() {
        let mut link = Recorder {
            open: true,
            fail_sends: true,
            ..Default::default()
        };
        let mut room = RoomCoordinator::new();

        room.join(7, &mut link, true).await;
        assert!(!room.is_joined());

        link.fail_sends = false;
        room.on_open(&mut link).await;
        assert!(room.is_joined());
        assert_eq!(link.sent, vec![ClientCommand::join(7)]);
    }

    #[tokio::test]
    async fn leave_only_after_a_join() {
        let mut link = Recorder {
            open: true,
            ..Default::default()
        };
        let mut room = RoomCoordinator::new();

        room.leave(&mut link, true).await;
        assert!(link.sent.is_empty());

        room.join(42, &mut link, true).await;
        room.on_joined(None);
        assert_eq!(room.confirmed_room(), Some("user_42"));

        room.leave(&mut link, true).await;
        assert_eq!(link.sent.last(), Some(&ClientCommand::leave(42)));
        assert_eq!(room.target(), None);
        assert_eq!(room.confirmed_room(), None);
    }
}
