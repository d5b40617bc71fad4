diesel::table! {
    calendar_events (id) {
        id -> Integer,
        owner_id -> Integer,
        title -> Text,
        description -> Nullable<Text>,
        start_time -> BigInt,
        end_time -> Nullable<BigInt>,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}
