mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, TimeZone, Utc};

use calendar_assistant::calendar::format::NO_EVENTS_MARKER;
use calendar_assistant::chat::DEFAULT_CHAT_TITLE;
use calendar_assistant::domains::chat::Role;
use calendar_assistant::domains::event::{EventEnd, NewEventInput};
use calendar_assistant::interfaces::clock::Clock;
use calendar_assistant::providers::memory::ConversationMemory;
use calendar_assistant::services::assistant::{AssistantService, AssistantSettings};
use calendar_assistant::FailureKind;

use common::{
    harness, harness_with_settings, moscow_user, ChatDroppingLlmProvider, FailingLlmProvider,
    QueueLlmProvider, SlowLlmProvider,
};

fn event_input(title: &str, start: &str, end: &str) -> NewEventInput {
    NewEventInput {
        title: title.to_string(),
        start: start.to_string(),
        end: EventEnd::At(end.to_string()),
        description: None,
    }
}

#[tokio::test]
async fn creates_event_from_tagged_reply() {
    let llm = Arc::new(QueueLlmProvider::new(vec![
        "<calendar_data>{\"title\": \"Dentist\", \"start\": \"2025-06-17T15:00\", \"duration\": \"1 hour\"}</calendar_data>\n\nDone! Dentist is booked for tomorrow at 15:00.",
    ]));
    let h = harness(llm.clone()).await;
    let user = moscow_user(1);

    let reply = h
        .assistant
        .handle_message(&user, "add dentist tomorrow at 15:00 for 1 hour")
        .await;

    assert!(reply.failure.is_none());
    assert!(reply.should_create_event);
    assert_eq!(reply.reply_text, "Done! Dentist is booked for tomorrow at 15:00.");
    assert!(!reply.reply_text.contains('<'));

    let id = reply.created_event_id.expect("created id");
    let event = h.assistant.calendar_for(&user).get_event(id).await.unwrap();
    assert_eq!(event.title, "Dentist");
    assert_eq!(event.start_time, Utc.with_ymd_and_hms(2025, 6, 17, 12, 0, 0).unwrap());
    assert_eq!(
        event.end_time,
        Some(Utc.with_ymd_and_hms(2025, 6, 17, 13, 0, 0).unwrap())
    );

    let stored = h
        .chats
        .latest_messages(reply.conversation_id.unwrap(), 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, Role::User);
    assert_eq!(stored[1].role, Role::Assistant);
    assert!(!stored[1].content.contains("calendar_data"));
}

#[tokio::test]
async fn conflicting_create_reports_existing_event() {
    let llm = Arc::new(QueueLlmProvider::new(vec![
        "<calendar_data>{\"title\": \"Call\", \"start\": \"2025-06-17T15:30\", \"duration\": 30}</calendar_data>Booked your call!",
    ]));
    let h = harness(llm).await;
    let user = moscow_user(1);
    let calendar = h.assistant.calendar_for(&user);
    calendar
        .create_event(
            &event_input("Dentist", "2025-06-17T15:00", "2025-06-17T16:00"),
            h.clock.now(),
        )
        .await
        .unwrap();

    let reply = h
        .assistant
        .handle_message(&user, "add a call tomorrow at 15:30")
        .await;

    assert_eq!(reply.failure, Some(FailureKind::Conflict));
    assert!(!reply.should_create_event);
    assert!(reply.created_event_id.is_none());
    assert!(reply.reply_text.contains("Dentist"));
    assert!(reply.reply_text.contains("15:00"));
    assert!(!reply.reply_text.contains("Booked"));

    let tomorrow = calendar
        .events_for_day(NaiveDate::from_ymd_opt(2025, 6, 17).unwrap())
        .await
        .unwrap();
    assert_eq!(tomorrow.len(), 1);
}

#[tokio::test]
async fn past_start_is_refused() {
    let llm = Arc::new(QueueLlmProvider::new(vec![
        "<calendar_data>{\"title\": \"Standup\", \"start\": \"2025-06-16T10:00\"}</calendar_data>Added.",
    ]));
    let h = harness(llm).await;
    let user = moscow_user(1);

    let reply = h.assistant.handle_message(&user, "add standup today at 10").await;

    assert_eq!(reply.failure, Some(FailureKind::PastTime));
    assert!(!reply.should_create_event);
    assert!(reply.reply_text.contains("2025-06-16 10:00"));
}

#[tokio::test]
async fn empty_day_context_uses_marker() {
    let llm = Arc::new(QueueLlmProvider::new(vec!["You have nothing planned today."]));
    let h = harness(llm.clone()).await;
    let user = moscow_user(1);

    let reply = h
        .assistant
        .handle_message(&user, "what's on my calendar today?")
        .await;

    assert!(reply.failure.is_none());
    assert_eq!(reply.reply_text, "You have nothing planned today.");

    let request = llm.last_request().await;
    assert_eq!(request.first().map(|t| t.role), Some(Role::System));
    let system = &request[0].content;
    assert!(system.contains(NO_EVENTS_MARKER));
    assert!(!system.contains("[id "));
    assert!(system.contains("Europe/Moscow"));
    assert_eq!(request.last().map(|t| t.role), Some(Role::User));
}

#[tokio::test]
async fn view_context_lists_day_events() {
    let llm = Arc::new(QueueLlmProvider::new(vec!["Here you go."]));
    let h = harness(llm.clone()).await;
    let user = moscow_user(1);
    h.assistant
        .calendar_for(&user)
        .create_event(
            &event_input("Gym", "2025-06-17T19:00", "2025-06-17T20:30"),
            h.clock.now(),
        )
        .await
        .unwrap();

    h.assistant
        .handle_message(&user, "what's on my schedule tomorrow?")
        .await;

    let system = llm.last_request().await[0].content.clone();
    assert!(system.contains("Upcoming:"));
    assert!(system.contains("19:00-20:30 Gym"));
}

#[tokio::test]
async fn ambiguous_delete_asks_for_clarification() {
    let llm = Arc::new(QueueLlmProvider::new(vec![
        "<calendar_delete>{\"title\": \"yoga\", \"date\": \"2025-06-18\"}</calendar_delete>Deleted your yoga.",
    ]));
    let h = harness(llm).await;
    let user = moscow_user(1);
    let calendar = h.assistant.calendar_for(&user);
    let now = h.clock.now();
    calendar
        .create_event(&event_input("Yoga", "2025-06-18T08:00", "2025-06-18T09:00"), now)
        .await
        .unwrap();
    calendar
        .create_event(
            &event_input("Evening yoga", "2025-06-18T19:00", "2025-06-18T20:00"),
            now,
        )
        .await
        .unwrap();

    let reply = h
        .assistant
        .handle_message(&user, "delete yoga on 2025-06-18")
        .await;

    assert_eq!(reply.failure, Some(FailureKind::Ambiguous));
    assert!(!reply.was_deleted);
    assert!(reply.reply_text.contains("08:00"));
    assert!(reply.reply_text.contains("19:00"));
    let remaining = calendar
        .events_for_day(NaiveDate::from_ymd_opt(2025, 6, 18).unwrap())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn delete_by_id_removes_exactly_one() {
    let h = harness(Arc::new(QueueLlmProvider::new(vec![]))).await;
    let user = moscow_user(1);
    let calendar = h.assistant.calendar_for(&user);
    let now = h.clock.now();
    calendar
        .create_event(&event_input("Yoga", "2025-06-18T08:00", "2025-06-18T09:00"), now)
        .await
        .unwrap();
    let evening = calendar
        .create_event(&event_input("Yoga", "2025-06-18T19:00", "2025-06-18T20:00"), now)
        .await
        .unwrap();

    let scripted = format!(
        "<calendar_delete>{{\"event_id\": {}}}</calendar_delete>",
        evening.id
    );
    let llm = Arc::new(QueueLlmProvider::new(vec![scripted.as_str()]));
    let assistant = AssistantService::new(
        llm,
        h.events.clone(),
        h.chats.clone(),
        Arc::new(ConversationMemory::new(10, 8)),
        h.clock.clone(),
        AssistantSettings::default(),
    );
    let reply = assistant
        .handle_message(&user, "delete the evening yoga on wednesday")
        .await;

    assert!(reply.was_deleted);
    assert_eq!(reply.deleted_event_id, Some(evening.id));
    assert!(reply.reply_text.contains("Yoga"));
    let remaining = calendar
        .events_for_day(NaiveDate::from_ymd_opt(2025, 6, 18).unwrap())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    let kept = remaining[0].start_time.with_timezone(&chrono_tz::Europe::Moscow);
    assert_eq!(kept.format("%H:%M").to_string(), "08:00");
}

#[tokio::test]
async fn model_failure_returns_apology_and_keeps_history() {
    let h = harness(Arc::new(FailingLlmProvider)).await;
    let user = moscow_user(1);

    let reply = h.assistant.handle_message(&user, "hello there").await;

    assert_eq!(reply.failure, Some(FailureKind::ExternalService));
    assert!(reply.reply_text.starts_with("Sorry"));
    let stored = h
        .chats
        .latest_messages(reply.conversation_id.unwrap(), 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].content, "hello there");
    assert_eq!(stored[1].content, reply.reply_text);
}

#[tokio::test]
async fn model_timeout_is_an_external_failure() {
    let settings = AssistantSettings {
        llm_timeout: StdDuration::from_millis(50),
        ..AssistantSettings::default()
    };
    let h = harness_with_settings(
        Arc::new(SlowLlmProvider(StdDuration::from_secs(5))),
        settings,
    )
    .await;
    let user = moscow_user(1);

    let reply = h.assistant.handle_message(&user, "hi").await;

    assert_eq!(reply.failure, Some(FailureKind::ExternalService));
    assert!(!reply.reply_text.contains("too late"));
}

#[tokio::test]
async fn malformed_tag_is_ignored() {
    let llm = Arc::new(QueueLlmProvider::new(vec![
        "<calendar_data>{title: oops,}</calendar_data>\nSure thing.",
    ]));
    let h = harness(llm).await;
    let user = moscow_user(1);

    let reply = h.assistant.handle_message(&user, "add something tomorrow").await;

    assert!(reply.failure.is_none());
    assert!(!reply.should_create_event);
    assert_eq!(reply.reply_text, "Sure thing.");
    let events = h
        .assistant
        .calendar_for(&user)
        .events_for_week(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap())
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn empty_message_is_rejected_without_side_effects() {
    let llm = Arc::new(QueueLlmProvider::new(vec![]));
    let h = harness(llm.clone()).await;
    let user = moscow_user(1);

    let reply = h.assistant.handle_message(&user, "   ").await;

    assert_eq!(reply.failure, Some(FailureKind::Validation));
    assert!(reply.conversation_id.is_none());
    assert_eq!(llm.request_count().await, 0);
    assert!(h.chats.search_messages(user.id, "a", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_is_hydrated_from_store() {
    let llm = Arc::new(QueueLlmProvider::new(vec!["Nice to meet you, Ann."]));
    let h = harness(llm).await;
    let user = moscow_user(1);
    h.assistant.handle_message(&user, "my name is Ann").await;

    let fresh_llm = Arc::new(QueueLlmProvider::new(vec!["Your name is Ann."]));
    let restarted = AssistantService::new(
        fresh_llm.clone(),
        h.events.clone(),
        h.chats.clone(),
        Arc::new(ConversationMemory::new(10, 8)),
        h.clock.clone(),
        AssistantSettings::default(),
    );
    let reply = restarted.handle_message(&user, "what is my name?").await;
    assert_eq!(reply.reply_text, "Your name is Ann.");

    let request = fresh_llm.last_request().await;
    let roles: Vec<Role> = request.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
    assert_eq!(request[1].content, "my name is Ann");
    assert_eq!(request[2].content, "Nice to meet you, Ann.");
    assert_eq!(request[3].content, "what is my name?");
}

#[tokio::test]
async fn russian_message_gets_russian_fallbacks() {
    let h = harness(Arc::new(FailingLlmProvider)).await;
    let mut user = moscow_user(1);
    user.preferred_language = "en".to_string();

    let reply = h.assistant.handle_message(&user, "привет").await;

    assert_eq!(reply.failure, Some(FailureKind::ExternalService));
    assert!(reply.reply_text.starts_with("Извините"));
}

#[tokio::test]
async fn delete_without_date_uses_message_window() {
    let llm = Arc::new(QueueLlmProvider::new(vec![
        "<calendar_delete>{\"title\": \"dentist\"}</calendar_delete>",
        "<calendar_delete>{\"event_id\": 9999}</calendar_delete>Gone!",
    ]));
    let h = harness(llm).await;
    let user = moscow_user(1);
    let calendar = h.assistant.calendar_for(&user);
    let dentist = calendar
        .create_event(
            &event_input("Dentist", "2025-06-17T15:00", "2025-06-17T16:00"),
            h.clock.now(),
        )
        .await
        .unwrap();

    let reply = h
        .assistant
        .handle_message(&user, "remove the dentist tomorrow")
        .await;
    assert!(reply.was_deleted);
    assert_eq!(reply.deleted_event_id, Some(dentist.id));
    assert!(reply.reply_text.contains("Dentist"));

    let reply = h.assistant.handle_message(&user, "delete event 9999").await;
    assert_eq!(reply.failure, Some(FailureKind::NotFound));
    assert!(!reply.was_deleted);
    assert!(!reply.reply_text.contains("Gone"));
}

#[tokio::test]
async fn out_of_range_durations_are_refused() {
    for duration in ["1e15", "\"inf\"", "\"1000000000 days\""] {
        let scripted = format!(
            "<calendar_data>{{\"title\": \"Gym\", \"start\": \"2025-06-17T10:00\", \"duration\": {duration}}}</calendar_data>Booked."
        );
        let llm = Arc::new(QueueLlmProvider::new(vec![scripted.as_str()]));
        let h = harness(llm).await;
        let user = moscow_user(1);

        let reply = h.assistant.handle_message(&user, "add gym tomorrow at 10").await;

        assert_eq!(reply.failure, Some(FailureKind::Validation), "duration {duration}");
        assert!(!reply.should_create_event);
        assert!(reply.created_event_id.is_none());
        let tuesday = h
            .assistant
            .calendar_for(&user)
            .events_for_day(NaiveDate::from_ymd_opt(2025, 6, 17).unwrap())
            .await
            .unwrap();
        assert!(tuesday.is_empty());
    }
}

#[tokio::test]
async fn free_time_context_lists_gaps_around_events() {
    let llm = Arc::new(QueueLlmProvider::new(vec!["You are free most of tomorrow."]));
    let h = harness(llm.clone()).await;
    let user = moscow_user(1);
    h.assistant
        .calendar_for(&user)
        .create_event(
            &event_input("Dentist", "2025-06-17T10:00", "2025-06-17T11:00"),
            h.clock.now(),
        )
        .await
        .unwrap();

    let reply = h
        .assistant
        .handle_message(&user, "when am I free tomorrow?")
        .await;
    assert!(reply.failure.is_none());

    let system = llm.last_request().await[0].content.clone();
    assert!(system.contains("Free slots"));
    assert!(system.contains("- Tue 17 Jun 09:00-10:00 (1 h)"));
    assert!(system.contains("- Tue 17 Jun 11:00-18:00 (7 h)"));
    assert!(system.contains("10:00-11:00 Dentist"));
    assert!(!system.contains("Wed 18 Jun"));
}

#[tokio::test]
async fn free_time_mid_week_stays_inside_the_week() {
    let llm = Arc::new(QueueLlmProvider::new(vec!["Plenty of room."]));
    let h = harness(llm.clone()).await;
    let user = moscow_user(1);
    // Thursday 10:00 in Moscow.
    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 19, 7, 0, 0).unwrap());

    h.assistant
        .handle_message(&user, "when am I free this week?")
        .await;

    let system = llm.last_request().await[0].content.clone();
    let slot_lines: Vec<&str> = system
        .lines()
        .filter(|line| line.starts_with("- ") && line.ends_with(" h)"))
        .collect();
    assert_eq!(
        slot_lines,
        vec![
            "- Thu 19 Jun 10:00-18:00 (8 h)",
            "- Fri 20 Jun 09:00-18:00 (9 h)",
            "- Sat 21 Jun 09:00-18:00 (9 h)",
            "- Sun 22 Jun 09:00-18:00 (9 h)",
        ]
    );
    assert!(!system.contains("Mon 23 Jun"));
}

#[tokio::test]
async fn committed_create_is_reported_when_history_write_fails() {
    let h = harness(Arc::new(QueueLlmProvider::new(vec![]))).await;
    let user = moscow_user(1);
    let chat = h
        .chats
        .get_or_create_chat(user.id, DEFAULT_CHAT_TITLE, h.clock.now())
        .await
        .unwrap();
    let llm = Arc::new(ChatDroppingLlmProvider {
        chats: h.chats.clone(),
        owner_id: user.id,
        chat_id: chat.id,
        reply: "<calendar_data>{\"title\": \"Gym\", \"start\": \"2025-06-17T10:00\"}</calendar_data>Gym is booked.".to_string(),
    });
    let assistant = AssistantService::new(
        llm,
        h.events.clone(),
        h.chats.clone(),
        Arc::new(ConversationMemory::new(10, 8)),
        h.clock.clone(),
        AssistantSettings::default(),
    );

    let reply = assistant.handle_message(&user, "add gym tomorrow at 10").await;

    assert!(reply.failure.is_none());
    assert!(reply.should_create_event);
    assert_eq!(reply.reply_text, "Gym is booked.");
    let id = reply.created_event_id.expect("created id");
    let event = assistant.calendar_for(&user).get_event(id).await.unwrap();
    assert_eq!(event.title, "Gym");
    assert!(h.chats.get_chat(user.id, chat.id).await.unwrap().is_none());
}
