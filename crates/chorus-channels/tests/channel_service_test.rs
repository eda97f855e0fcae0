use async_trait::async_trait;
use chorus_bus::{EventBus, EventHandler};
use chorus_channels::ChannelService;
use chorus_common::domain::{ChannelType, MemberRole};
use chorus_common::event::{Event, EventData, EventType};
use chorus_common::repo::{InMemoryChannelRepository, InMemoryMessageRepository};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Collector {
    events: Mutex<Vec<Event>>,
}

impl Collector {
    fn new() -> Arc<Self> {
        Arc::new(Collector {
            events: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl EventHandler for Collector {
    async fn handle(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn new_service() -> Arc<ChannelService> {
    let bus = Arc::new(EventBus::new(1000, 1000));
    ChannelService::new(
        bus,
        Arc::new(InMemoryChannelRepository::default()),
        Arc::new(InMemoryMessageRepository::default()),
        5,
        3600,
    )
}

#[tokio::test]
async fn create_channel_then_list_then_get_round_trips() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    let listed = service.list_channels().await;
    assert!(listed.iter().any(|c| c.id == "c1"));
    let fetched = service.get_channel("c1").await.unwrap();
    assert_eq!(fetched.name, "random");
    assert_eq!(fetched.channel_type, ChannelType::Public);
}

#[tokio::test]
async fn duplicate_channel_id_is_rejected() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    let result = service
        .create_channel("c1", "random-2", ChannelType::Public, None, None, HashMap::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn default_channels_cannot_be_deleted() {
    let service = new_service();
    service.ensure_default_channels().await.unwrap();
    let result = service.delete_channel("general").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn send_message_emits_exactly_one_event_with_matching_content() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    let collector = Collector::new();
    let bus = Arc::new(EventBus::new(1000, 1000));
    // rebuild with the same bus the collector subscribes to
    let service = ChannelService::new(
        bus.clone(),
        Arc::new(InMemoryChannelRepository::default()),
        Arc::new(InMemoryMessageRepository::default()),
        5,
        3600,
    );
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    bus.subscribe(EventType::ChannelMessage, collector.clone()).await;
    service
        .send_message("c1", "u1", "hi", HashMap::new(), None)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(collector.count(), 1);
    let events = collector.events.lock().unwrap();
    match &events[0].data {
        EventData::ChannelMessage { content, message_id, .. } => {
            assert_eq!(content, "hi");
            assert!(message_id.starts_with("msg_"));
        }
        _ => panic!("wrong event data"),
    }
}

#[tokio::test]
async fn concurrent_sends_produce_distinct_message_ids() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .send_message("c1", format!("u{i}"), format!("msg{i}"), HashMap::new(), None)
                .await
                .unwrap()
        }));
    }
    let mut ids = std::collections::HashSet::new();
    let mut contents = std::collections::HashSet::new();
    for handle in handles {
        let message = handle.await.unwrap();
        ids.insert(message.id);
        contents.insert(message.content);
    }
    assert_eq!(ids.len(), 20);
    assert_eq!(contents.len(), 20);
}

#[tokio::test]
async fn add_member_emits_member_added_and_system_join_message() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    service
        .add_member("c1", "m1", MemberRole::Member, Some("admin".to_string()))
        .await
        .unwrap();
    let (messages, _, _) = service.get_messages("c1", 10, 0).await.unwrap();
    assert!(messages
        .iter()
        .any(|m| m.sender_id == "system" && m.content == "m1 joined the channel"));
}

#[tokio::test]
async fn private_channel_add_member_requires_permission() {
    let service = new_service();
    service
        .create_channel("c1", "secret", ChannelType::Private, None, Some("admin".to_string()), HashMap::new())
        .await
        .unwrap();
    service
        .add_member("c1", "admin", MemberRole::Admin, None)
        .await
        .unwrap();
    let result = service
        .add_member("c1", "intruder", MemberRole::Member, Some("nobody".to_string()))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn send_message_to_nonexistent_channel_is_not_found() {
    let service = new_service();
    let result = service.send_message("ghost", "u1", "hi", HashMap::new(), None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn add_member_then_remove_member_restores_membership() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    service
        .add_member("c1", "m1", MemberRole::Member, None)
        .await
        .unwrap();
    service.remove_member("c1", "m1", None).await.unwrap();
    let channel = service.get_channel("c1").await.unwrap();
    assert!(!channel.has_member("m1"));
}

#[tokio::test]
async fn flush_now_drains_the_buffer() {
    let service = new_service();
    service
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    service
        .send_message("c1", "u1", "hi", HashMap::new(), None)
        .await
        .unwrap();
    service.flush_now().await;
    let (messages, _, _) = service.get_messages("c1", 10, 0).await.unwrap();
    assert_eq!(messages.len(), 1);
}
