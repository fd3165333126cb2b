//! Table definitions, portable between SQLite and PostgreSQL.

pub(crate) const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        role TEXT NOT NULL,
        approval_status TEXT NOT NULL,
        display_name TEXT NOT NULL,
        email TEXT NOT NULL,
        timezone TEXT,
        province TEXT,
        appointment_length_minutes BIGINT NOT NULL,
        paused BIGINT NOT NULL DEFAULT 0,
        payment_customer_ref TEXT,
        updated_at_ms BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS availability_rules (
        agent_id TEXT NOT NULL,
        location TEXT NOT NULL,
        weekday BIGINT NOT NULL,
        enabled BIGINT NOT NULL,
        start_local TEXT NOT NULL,
        end_local TEXT NOT NULL,
        updated_at_ms BIGINT NOT NULL,
        PRIMARY KEY (agent_id, location, weekday)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS availability_overrides (
        agent_id TEXT NOT NULL,
        location TEXT NOT NULL,
        override_date TEXT NOT NULL,
        start_local TEXT NOT NULL,
        end_local TEXT NOT NULL,
        updated_at_ms BIGINT NOT NULL,
        PRIMARY KEY (agent_id, location, override_date)
    )
    "#,
    // confirmed_slot is confirmed_at floored to the conflict bucket; NULL once cancelled.
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        lead_id TEXT NOT NULL,
        location TEXT,
        requested_date TEXT NOT NULL,
        requested_window TEXT NOT NULL,
        status TEXT NOT NULL,
        confirmed_at_ms BIGINT,
        confirmed_slot BIGINT,
        price_minor_units BIGINT NOT NULL,
        payment_charge_ref TEXT,
        rescheduled_from TEXT,
        created_at_ms BIGINT NOT NULL,
        updated_at_ms BIGINT NOT NULL,
        UNIQUE (agent_id, confirmed_slot)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_appointments_agent_time ON appointments (agent_id, confirmed_at_ms)",
    r#"
    CREATE TABLE IF NOT EXISTS leads (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT,
        city TEXT,
        province TEXT,
        service_type TEXT,
        created_at_ms BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS declined_payments (
        id TEXT PRIMARY KEY,
        appointment_id TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        amount_minor_units BIGINT NOT NULL,
        reason TEXT NOT NULL,
        recorded_at_ms BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS calendar_connections (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        provider TEXT NOT NULL,
        access_token TEXT NOT NULL,
        refresh_token TEXT NOT NULL,
        token_expires_at_ms BIGINT NOT NULL,
        calendar_id TEXT NOT NULL,
        sync_enabled BIGINT NOT NULL,
        channel_id TEXT,
        channel_resource_id TEXT,
        channel_expires_at_ms BIGINT,
        updated_at_ms BIGINT NOT NULL,
        UNIQUE (agent_id, provider)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_calendar_connections_channel ON calendar_connections (channel_id)",
    r#"
    CREATE TABLE IF NOT EXISTS external_events (
        specialist_id TEXT NOT NULL,
        provider TEXT NOT NULL,
        provider_event_id TEXT NOT NULL,
        is_platform_created BIGINT NOT NULL,
        appointment_id TEXT,
        starts_at_ms BIGINT NOT NULL,
        ends_at_ms BIGINT NOT NULL,
        status TEXT NOT NULL,
        updated_at_ms BIGINT NOT NULL,
        PRIMARY KEY (specialist_id, provider, provider_event_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS external_event_tombstones (
        specialist_id TEXT NOT NULL,
        provider TEXT NOT NULL,
        provider_event_id TEXT NOT NULL,
        deleted_at_ms BIGINT NOT NULL,
        PRIMARY KEY (specialist_id, provider, provider_event_id)
    )
    "#,
];
