mod common;

use chrono::Duration;

use calendar_assistant::chat::{ChatStore, DEFAULT_CHAT_TITLE};
use calendar_assistant::domains::chat::Role;
use calendar_assistant::error::AssistantError;

use common::{monday_morning, temp_db};

#[tokio::test]
async fn one_chat_per_owner() {
    let (_db, path) = temp_db();
    let store = ChatStore::new(&path).await.unwrap();
    let now = monday_morning();

    let first = store.get_or_create_chat(1, DEFAULT_CHAT_TITLE, now).await.unwrap();
    let again = store
        .get_or_create_chat(1, "ignored", now + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.title, DEFAULT_CHAT_TITLE);

    let other = store.get_or_create_chat(2, DEFAULT_CHAT_TITLE, now).await.unwrap();
    assert_ne!(first.id, other.id);
    assert!(store.get_chat(2, first.id).await.unwrap().is_none());
}

#[tokio::test]
async fn exchanges_are_appended_in_order() {
    let (_db, path) = temp_db();
    let store = ChatStore::new(&path).await.unwrap();
    let now = monday_morning();
    let chat = store.get_or_create_chat(1, DEFAULT_CHAT_TITLE, now).await.unwrap();

    for i in 0..3 {
        let at = now + Duration::minutes(i);
        let (user, assistant) = store
            .append_exchange(chat.id, &format!("question {i}"), &format!("answer {i}"), at)
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(assistant.role, Role::Assistant);
        assert!(user.id < assistant.id);
    }

    let latest = store.latest_messages(chat.id, 4).await.unwrap();
    let contents: Vec<&str> = latest.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["question 1", "answer 1", "question 2", "answer 2"]);

    let older = store
        .list_messages(chat.id, 10, Some(latest[0].id))
        .await
        .unwrap();
    let contents: Vec<&str> = older.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["question 0", "answer 0"]);

    let refreshed = store.get_chat(1, chat.id).await.unwrap().unwrap();
    assert_eq!(refreshed.updated_at, now + Duration::minutes(2));

    let err = store
        .append_exchange(9999, "hi", "hello", now)
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::NotFound(_)));
}

#[tokio::test]
async fn search_is_case_insensitive_and_owner_scoped() {
    let (_db, path) = temp_db();
    let store = ChatStore::new(&path).await.unwrap();
    let now = monday_morning();
    let mine = store.get_or_create_chat(1, DEFAULT_CHAT_TITLE, now).await.unwrap();
    let theirs = store.get_or_create_chat(2, DEFAULT_CHAT_TITLE, now).await.unwrap();

    store
        .append_exchange(mine.id, "Book the DENTIST", "Done.", now)
        .await
        .unwrap();
    store
        .append_exchange(mine.id, "Перенеси Встречу", "Готово.", now)
        .await
        .unwrap();
    store
        .append_exchange(theirs.id, "dentist again", "Sure.", now)
        .await
        .unwrap();

    let hits = store.search_messages(1, "dentist", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chat_id, mine.id);

    let hits = store.search_messages(1, "встречу", 10).await.unwrap();
    assert_eq!(hits.len(), 1);

    assert!(store.search_messages(1, "   ", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_and_delete_chat() {
    let (_db, path) = temp_db();
    let store = ChatStore::new(&path).await.unwrap();
    let now = monday_morning();
    let chat = store.get_or_create_chat(1, DEFAULT_CHAT_TITLE, now).await.unwrap();
    store.append_exchange(chat.id, "hi", "hello", now).await.unwrap();

    let renamed = store
        .update_chat_title(1, chat.id, "Work planning", now)
        .await
        .unwrap();
    assert_eq!(renamed.title, "Work planning");
    assert!(matches!(
        store.update_chat_title(1, chat.id, "  ", now).await,
        Err(AssistantError::Validation(_))
    ));
    assert!(matches!(
        store.update_chat_title(2, chat.id, "Mine now", now).await,
        Err(AssistantError::NotFound(_))
    ));

    assert!(!store.delete_chat(2, chat.id).await.unwrap());
    assert!(store.delete_chat(1, chat.id).await.unwrap());
    assert!(store.get_chat(1, chat.id).await.unwrap().is_none());
    assert!(store.latest_messages(chat.id, 10).await.unwrap().is_empty());

    let fresh = store.get_or_create_chat(1, DEFAULT_CHAT_TITLE, now).await.unwrap();
    assert!(store.latest_messages(fresh.id, 10).await.unwrap().is_empty());
}
