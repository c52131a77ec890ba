//! 聊天客户端单元测试
//!
//! 覆盖加入/离开生命周期、本地回显、入站去重以及日志顺序。

#[cfg(test)]
mod chat_client_tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use domain::{
        ChatMessage, DomainError, InboundEvent, InboundMessage, OutboundEvent, RelayEventName,
        SessionPhase,
    };

    use crate::chat_client::ChatClient;
    use crate::clock::Clock;
    use crate::connection::{MockRelayConnection, RelayConnection};
    use crate::memory_connection::MemoryRelayConnection;

    /// 每次调用前进一秒的测试时钟
    struct StepClock {
        next: AtomicI64,
    }

    impl StepClock {
        fn starting_at(secs: i64) -> Arc<Self> {
            Arc::new(Self {
                next: AtomicI64::new(secs),
            })
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let secs = self.next.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_opt(secs, 0).unwrap()
        }
    }

    fn client() -> (ChatClient<MemoryRelayConnection>, MemoryRelayConnection) {
        let relay = MemoryRelayConnection::new();
        let client = ChatClient::new(relay.clone(), StepClock::starting_at(1_714_903_200));
        (client, relay)
    }

    fn joined(room: &str, user: &str) -> (ChatClient<MemoryRelayConnection>, MemoryRelayConnection) {
        let (mut client, relay) = client();
        client.join(room, user).unwrap();
        relay.take_emitted();
        (client, relay)
    }

    fn receive(username: &str, text: &str) -> InboundEvent {
        InboundEvent::ReceiveMessage(InboundMessage {
            room: Some("r1".to_string()),
            message: Some(text.to_string()),
            username: Some(username.to_string()),
            time: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        })
    }

    fn authors(client: &ChatClient<MemoryRelayConnection>) -> Vec<(&str, &str)> {
        client
            .messages()
            .iter()
            .map(|m| (m.username(), m.message()))
            .collect()
    }

    #[test]
    fn test_join_with_empty_fields_has_no_effect() {
        for (room, user) in [("", "alice"), ("r1", ""), ("", "")] {
            let mut relay = MockRelayConnection::new();
            relay.expect_connect().never();
            relay.expect_emit().never();
            relay.expect_on().never();

            let mut client = ChatClient::with_system_clock(relay);
            let err = client.join(room, user).unwrap_err();

            assert!(err.is_validation());
            assert_eq!(client.session().phase(), SessionPhase::Unjoined);
            assert!(!client.is_listening());
        }
    }

    #[test]
    fn test_join_emits_exactly_one_join_room() {
        let (mut client, relay) = client();
        client.join("r1", "alice").unwrap();

        assert!(client.session().is_joined());
        assert_eq!(relay.emitted(), vec![OutboundEvent::join_room("r1")]);
        assert!(relay.is_connected());
        assert!(relay.has_listener(RelayEventName::ReceiveMessage));
    }

    #[test]
    fn test_join_while_joined_is_rejected() {
        let (mut client, relay) = joined("r1", "alice");
        let err = client.join("r2", "bob").unwrap_err();

        assert!(matches!(err, DomainError::InvalidPhase { operation: "join", .. }));
        assert_eq!(client.session().room_id(), "r1");
        assert!(relay.emitted().is_empty());
    }

    #[test]
    fn test_send_appends_local_echo_and_emits_once() {
        let (mut client, relay) = client();
        client.join("r1", "alice").unwrap();
        let sent = client.send("hi").unwrap();

        assert_eq!(authors(&client), vec![("alice", "hi")]);
        assert_eq!(client.messages().last(), Some(&sent));
        assert_eq!(sent.room(), "r1");
        assert_eq!(
            relay.emitted(),
            vec![
                OutboundEvent::join_room("r1"),
                OutboundEvent::SendMessage(sent),
            ]
        );
    }

    #[test]
    fn test_send_uses_clock() {
        let (mut client, _relay) = joined("r1", "alice");
        let first = client.send("one").unwrap();
        let second = client.send("two").unwrap();
        assert!(second.time() > first.time());
    }

    #[test]
    fn test_send_empty_text_is_rejected() {
        let mut relay = MockRelayConnection::new();
        relay.expect_connect().times(1).return_const(());
        relay
            .expect_on()
            .times(1)
            .returning(|_| tokio::sync::mpsc::unbounded_channel().1);
        relay
            .expect_emit()
            .withf(|event| matches!(event, OutboundEvent::JoinRoom(_)))
            .times(1)
            .return_const(());

        let mut client = ChatClient::with_system_clock(relay);
        client.join("r1", "alice").unwrap();

        let err = client.send("").unwrap_err();
        assert!(matches!(err, DomainError::ValidationError { ref field, .. } if field == "message"));
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_send_while_unjoined_is_rejected() {
        let (mut client, relay) = client();
        let err = client.send("hi").unwrap_err();

        assert!(matches!(err, DomainError::InvalidPhase { operation: "send", .. }));
        assert!(relay.emitted().is_empty());
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_inbound_from_peer_is_appended_after_prior_entries() {
        let (mut client, relay) = joined("r1", "alice");
        client.send("hi").unwrap();
        let before = client.messages().as_slice().to_vec();

        assert!(relay.deliver(receive("bob", "yo")));
        assert_eq!(client.process_pending(), 1);

        assert_eq!(
            authors(&client),
            vec![("alice", "hi"), ("bob", "yo")]
        );
        assert_eq!(&client.messages().as_slice()[..1], before.as_slice());
    }

    #[test]
    fn test_own_echo_is_suppressed() {
        let (mut client, relay) = joined("r1", "alice");
        client.send("hi").unwrap();

        relay.deliver(receive("alice", "hi"));
        assert_eq!(client.process_pending(), 0);
        assert_eq!(client.messages().len(), 1);
    }

    #[test]
    fn test_same_username_from_other_participant_is_also_dropped() {
        let (mut client, _relay) = joined("r1", "alice");
        assert!(!client.apply_inbound(receive("alice", "I am another alice")));
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_inbound_is_ignored_until_joined() {
        let (mut client, _relay) = client();
        client.set_room_id("r1").unwrap();
        client.set_username("alice").unwrap();

        assert!(!client.apply_inbound(receive("bob", "yo")));
        assert!(client.messages().is_empty());

        client.join_current().unwrap();
        assert!(client.apply_inbound(receive("bob", "yo")));
        assert_eq!(authors(&client), vec![("bob", "yo")]);
    }

    #[test]
    fn test_inbound_after_leave_is_ignored() {
        let (mut client, _relay) = joined("r1", "alice");
        client.leave().unwrap();

        assert!(!client.apply_inbound(receive("bob", "late")));
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_inbound_without_text_is_ignored() {
        let (mut client, _relay) = joined("r1", "alice");
        assert!(!client.apply_inbound(receive("bob", "")));
        assert!(!client.apply_inbound(InboundEvent::ReceiveMessage(InboundMessage {
            username: Some("bob".into()),
            ..Default::default()
        })));
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_inbound_without_author_is_accepted() {
        let (mut client, _relay) = joined("r1", "alice");
        assert!(client.apply_inbound(InboundEvent::ReceiveMessage(InboundMessage {
            message: Some("anon".into()),
            ..Default::default()
        })));

        let message = client.messages().last().unwrap();
        assert_eq!(message.username(), "");
        assert_eq!(message.room(), "r1");
        assert_eq!(message.time(), Utc.timestamp_opt(1_714_903_200, 0).unwrap());
    }

    #[test]
    fn test_arrival_order_is_kept_regardless_of_timestamps() {
        let (mut client, relay) = joined("r1", "alice");
        let late = InboundEvent::ReceiveMessage(InboundMessage {
            message: Some("late".into()),
            username: Some("bob".into()),
            time: Some(Utc.timestamp_opt(2_000_000_000, 0).unwrap()),
            ..Default::default()
        });
        relay.deliver(late);
        relay.deliver(receive("carol", "early"));
        client.process_pending();
        client.send("mine").unwrap();

        let texts: Vec<_> = client.messages().iter().map(ChatMessage::message).collect();
        assert_eq!(texts, vec!["late", "early", "mine"]);
    }

    #[test]
    fn test_leave_releases_everything() {
        let (mut client, relay) = joined("r1", "alice");
        client.send("hi").unwrap();
        relay.take_emitted();

        client.leave().unwrap();

        assert_eq!(relay.emitted(), vec![OutboundEvent::leave_room("r1")]);
        assert!(!relay.has_listener(RelayEventName::ReceiveMessage));
        assert!(!relay.is_connected());
        assert!(!client.is_listening());

        let session = client.session();
        assert_eq!(session.phase(), SessionPhase::Unjoined);
        assert!(session.room_id().is_empty());
        assert!(session.username().is_empty());
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_leave_call_order() {
        let mut seq = mockall::Sequence::new();
        let mut relay = MockRelayConnection::new();
        relay.expect_connect().return_const(());
        relay
            .expect_on()
            .returning(|_| tokio::sync::mpsc::unbounded_channel().1);
        relay
            .expect_emit()
            .withf(|event| matches!(event, OutboundEvent::JoinRoom(_)))
            .return_const(());
        relay
            .expect_emit()
            .withf(|event| *event == OutboundEvent::leave_room("r1"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        relay
            .expect_off()
            .withf(|name| *name == RelayEventName::ReceiveMessage)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        relay
            .expect_disconnect()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut client = ChatClient::with_system_clock(relay);
        client.join("r1", "alice").unwrap();
        client.leave().unwrap();
    }

    #[test]
    fn test_leave_while_unjoined_is_rejected() {
        let mut relay = MockRelayConnection::new();
        relay.expect_emit().never();
        relay.expect_off().never();
        relay.expect_disconnect().never();

        let mut client = ChatClient::with_system_clock(relay);
        assert!(matches!(
            client.leave(),
            Err(DomainError::InvalidPhase { operation: "leave", .. })
        ));
    }

    #[test]
    fn test_messages_queued_before_leave_are_discarded() {
        let (mut client, relay) = joined("r1", "alice");
        relay.deliver(receive("bob", "too late"));
        client.leave().unwrap();

        assert_eq!(client.process_pending(), 0);
        assert!(client.messages().is_empty());
    }

    #[test]
    fn test_rejoin_reuses_connection_and_registers_single_listener() {
        let (mut client, relay) = joined("r1", "alice");
        client.leave().unwrap();
        client.join("r2", "bob").unwrap();

        assert_eq!(relay.connect_count(), 2);
        assert!(relay.has_listener(RelayEventName::ReceiveMessage));

        relay.deliver(receive("alice", "hello bob"));
        assert_eq!(client.process_pending(), 1);
        assert_eq!(authors(&client), vec![("alice", "hello bob")]);
    }

    #[test]
    fn test_dedup_reads_live_username() {
        let (mut client, relay) = joined("r1", "alice");
        client.leave().unwrap();
        client.join("r1", "bob").unwrap();

        // 旧身份 alice 的消息现在来自他人
        relay.deliver(receive("alice", "hi bob"));
        relay.deliver(receive("bob", "echo"));
        assert_eq!(client.process_pending(), 1);
        assert_eq!(authors(&client), vec![("alice", "hi bob")]);
    }

    #[test]
    fn test_form_edits_reset_log_while_unjoined() {
        let (mut client, _relay) = client();
        client.set_room_id("r1").unwrap();
        client.set_username("alice").unwrap();
        client.join_current().unwrap();
        client.send("hi").unwrap();

        assert!(client.set_room_id("r2").is_err());
        assert_eq!(client.messages().len(), 1);

        client.leave().unwrap();
        client.set_room_id("r2").unwrap();
        client.set_username("carol").unwrap();
        assert!(client.messages().is_empty());
        assert!(!client.session().is_joined());
    }

    #[tokio::test]
    async fn test_next_inbound_awaits_delivery() {
        let (mut client, relay) = joined("r1", "alice");

        let handle = relay.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            handle.deliver(receive("bob", "later"));
        });

        let event = client.next_inbound().await.unwrap();
        assert!(client.apply_inbound(event));
        assert_eq!(authors(&client), vec![("bob", "later")]);
    }

    #[tokio::test]
    async fn test_next_inbound_without_listener_returns_none() {
        let (mut client, _relay) = client();
        assert!(client.next_inbound().await.is_none());
    }
}
