diesel::table! {
    alembic_version (version_num) {
        #[max_length = 32]
        version_num -> Varchar,
    }
}

diesel::table! {
    journals (id) {
        id -> Int4,
        name -> Nullable<Text>,
        version -> Nullable<Text>,
        action -> Nullable<Text>,
    }
}

diesel::table! {
    packages (name) {
        name -> Text,
        last_serial -> Int4,
    }
}

diesel::allow_tables_to_appear_in_same_query!(journals, packages);
