diesel::table! {
    chats (id) {
        id -> Integer,
        owner_id -> Integer,
        title -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    chat_messages (id) {
        id -> Integer,
        chat_id -> Integer,
        role -> Text,
        content -> Text,
        created_at -> BigInt,
    }
}

diesel::joinable!(chat_messages -> chats (chat_id));
diesel::allow_tables_to_appear_in_same_query!(chats, chat_messages);
