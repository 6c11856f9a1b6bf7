//! Diesel schema definitions for the catalog and audit tables.

diesel::table! {
    use diesel::sql_types::*;

    query_templates (id) {
        id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        category -> Nullable<Text>,
        sql_template -> Text,
        parameter_schema -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    opportunity_types (id) {
        id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        criteria -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    saved_searches (id) {
        id -> Uuid,
        caller_id -> Nullable<Text>,
        display_name -> Text,
        query_kind -> Text,
        raw_text -> Nullable<Text>,
        generated_sql -> Nullable<Text>,
        parameters -> Nullable<Jsonb>,
        result_count -> Int8,
        created_at -> Timestamptz,
    }
}
