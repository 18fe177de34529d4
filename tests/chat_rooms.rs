//! Integration tests for chat room lifecycle and relay.

use std::sync::Arc;

use oscard::proto::snac::{SnacFrame, SnacMessage, foodgroup};
use oscard::proto::{DisplayScreenName, IdentScreenName};
use oscard::state::managers::ChatSessionManager;
use oscard::store::{ChatRoom, EXCHANGE_PRIVATE};
use tokio_util::sync::CancellationToken;

fn chat_msg() -> SnacMessage {
    SnacMessage::new(SnacFrame::new(foodgroup::CHAT, 0x0006), vec![0xAB])
}

#[tokio::test]
async fn room_is_garbage_collected_on_last_leave() {
    let manager = ChatSessionManager::new();
    let stop = CancellationToken::new();

    let room = ChatRoom::new("lobby", IdentScreenName::new("alice"), EXCHANGE_PRIVATE);
    let cookie = room.cookie();

    let alice = manager
        .add_session(&stop, &cookie, DisplayScreenName::new("alice"))
        .await
        .unwrap();
    assert_eq!(alice.chat_room_cookie(), cookie);

    manager.remove_session(&alice);
    assert!(manager.all_sessions(&cookie).is_empty());

    // A later join starts the room over from scratch.
    let again = manager
        .add_session(&stop, &cookie, DisplayScreenName::new("alice"))
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&alice, &again));
    assert_eq!(manager.all_sessions(&cookie).len(), 1);
}

#[tokio::test]
async fn chat_traffic_fans_out_to_everyone_but_the_sender() {
    let manager = ChatSessionManager::new();
    let stop = CancellationToken::new();

    let alice = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("alice"))
        .await
        .unwrap();
    let bob = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("bob"))
        .await
        .unwrap();
    let carol = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("carol"))
        .await
        .unwrap();

    manager.relay_to_all_except("4-0-lobby", &IdentScreenName::new("alice"), chat_msg());

    assert!(bob.recv_message().await.is_some());
    assert!(carol.recv_message().await.is_some());
    assert!(alice.try_recv_message().is_none());
}

#[tokio::test]
async fn whisper_reaches_only_its_target() {
    let manager = ChatSessionManager::new();
    let stop = CancellationToken::new();

    let alice = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("alice"))
        .await
        .unwrap();
    let bob = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("bob"))
        .await
        .unwrap();

    manager.relay_to_screen_name("4-0-lobby", &IdentScreenName::new("bob"), chat_msg());

    assert!(bob.recv_message().await.is_some());
    assert!(alice.try_recv_message().is_none());
}

#[tokio::test]
async fn rejoining_a_room_replaces_the_previous_chat_session() {
    let manager = Arc::new(ChatSessionManager::new());
    let stop = CancellationToken::new();

    let first = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("alice"))
        .await
        .unwrap();

    let front_end = {
        let manager = manager.clone();
        let first = first.clone();
        tokio::spawn(async move {
            first.closed().await;
            manager.remove_session(&first);
        })
    };

    let second = manager
        .add_session(&stop, "4-0-lobby", DisplayScreenName::new("alice"))
        .await
        .unwrap();
    front_end.await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(manager.all_sessions("4-0-lobby").len(), 1);
}

#[tokio::test]
async fn signoff_clears_the_user_from_every_room() {
    let manager = ChatSessionManager::new();
    let stop = CancellationToken::new();

    for cookie in ["4-0-lobby", "4-1-den", "5-0-trivia"] {
        manager
            .add_session(&stop, cookie, DisplayScreenName::new("alice"))
            .await
            .unwrap();
    }
    let bob = manager
        .add_session(&stop, "5-0-trivia", DisplayScreenName::new("bob"))
        .await
        .unwrap();

    manager.remove_user_from_all_chats(&IdentScreenName::new("alice"));

    assert!(manager.all_sessions("4-0-lobby").is_empty());
    assert!(manager.all_sessions("4-1-den").is_empty());
    let trivia = manager.all_sessions("5-0-trivia");
    assert_eq!(trivia.len(), 1);
    assert!(Arc::ptr_eq(&trivia[0], &bob));
}

#[tokio::test]
async fn concurrent_joins_land_in_one_room() {
    let manager = Arc::new(ChatSessionManager::new());
    let stop = CancellationToken::new();

    let mut joins = Vec::new();
    for i in 0..10 {
        let manager = manager.clone();
        let stop = stop.clone();
        joins.push(tokio::spawn(async move {
            manager
                .add_session(&stop, "4-0-lobby", DisplayScreenName::new(format!("user{i}")))
                .await
                .unwrap()
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    assert_eq!(manager.all_sessions("4-0-lobby").len(), 10);
}
