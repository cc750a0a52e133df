diesel::table! {
    messages (id) {
        id -> Integer,
        user_id -> Text,
        role -> Text,
        content -> Nullable<Text>,
        tool_call_id -> Nullable<Text>,
        tool_call -> Nullable<Text>,
        created_at -> BigInt,
    }
}

diesel::table! {
    reminders (id) {
        id -> Integer,
        user_id -> Text,
        content -> Text,
        reminder_at -> BigInt,
        recurrence_frequency -> Nullable<Integer>,
        recurrence_unit -> Nullable<Text>,
        created_at -> BigInt,
    }
}
