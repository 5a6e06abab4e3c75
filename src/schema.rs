// Table declarations for the shared SQLite store.
// Kept in sync with DbContext::init_schema.

diesel::table! {
    users (id) {
        id -> Text,
        email -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    companies (id) {
        id -> Text,
        display_name -> Text,
        domain -> Text,
        categories -> Text,
        risk_score -> Integer,
        user_id -> Text,
        last_crawled_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    crawl_targets (id) {
        id -> Text,
        company_id -> Text,
        url -> Text,
        kind -> Text,
        content_digest -> Nullable<Text>,
        last_crawled_at -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    claims (id) {
        id -> Text,
        company_id -> Text,
        claim_type -> Text,
        normalized_key -> Text,
        status -> Text,
        first_seen_at -> Text,
        last_seen_at -> Text,
        current_snippet -> Text,
        current_source_url -> Text,
        confidence -> Double,
    }
}

diesel::table! {
    claim_versions (id) {
        id -> Integer,
        claim_id -> Text,
        company_id -> Text,
        snippet -> Text,
        source_url -> Text,
        content_digest -> Text,
        polarity -> Text,
        meta -> Text,
        seen_at -> Text,
    }
}

diesel::table! {
    change_events (id) {
        id -> Text,
        company_id -> Text,
        claim_type -> Text,
        normalized_key -> Text,
        event_type -> Text,
        severity -> Text,
        old_snippet -> Nullable<Text>,
        new_snippet -> Nullable<Text>,
        source_url -> Text,
        detected_at -> Text,
        acknowledged -> Integer,
        emailed_at -> Nullable<Text>,
    }
}

diesel::table! {
    crawl_runs (id) {
        id -> Text,
        company_id -> Nullable<Text>,
        status -> Text,
        pages -> Integer,
        claims -> Integer,
        events -> Integer,
        errors -> Text,
        started_at -> Text,
        finished_at -> Nullable<Text>,
    }
}

diesel::table! {
    evidence (id) {
        id -> Text,
        company_id -> Text,
        claim_type -> Text,
        pdf_url -> Text,
        source_page_url -> Nullable<Text>,
        context_snippet -> Nullable<Text>,
        status -> Text,
        error -> Nullable<Text>,
        fields -> Nullable<Text>,
        processed_at -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    jobs (id) {
        id -> Integer,
        queue -> Text,
        payload -> Text,
        idempotency_key -> Text,
        priority -> Integer,
        status -> Text,
        attempt -> Integer,
        max_attempts -> Integer,
        run_at -> Text,
        claimed_by -> Nullable<Text>,
        claimed_at -> Nullable<Text>,
        last_error -> Nullable<Text>,
        created_at -> Text,
        finished_at -> Nullable<Text>,
    }
}

diesel::table! {
    scheduler_locks (name) {
        name -> Text,
        holder -> Text,
        expires_at -> Text,
    }
}
