//! SQLite schema definition.

/// Complete database schema for safedose.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Dosing Protocols
-- ============================================================================

CREATE TABLE IF NOT EXISTS dosing_protocols (
    id TEXT PRIMARY KEY,
    user_id TEXT,                                -- NULL for local-only protocols
    compound_name TEXT NOT NULL,
    concentration REAL NOT NULL CHECK (concentration > 0),
    concentration_unit TEXT NOT NULL,            -- mg/mL, mcg/mL, units/mL
    weekly_target_dose REAL NOT NULL CHECK (weekly_target_dose > 0),
    weekly_target_unit TEXT NOT NULL,            -- mg, mcg, units
    frequency TEXT NOT NULL CHECK (frequency IN ('1x-week', '2x-week', '3x-week', 'daily')),
    start_date TEXT NOT NULL,                    -- YYYY-MM-DD
    start_time TEXT NOT NULL,                    -- HH:MM
    schedule TEXT NOT NULL DEFAULT '[]',         -- JSON array of ProtocolSchedule
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_protocols_user ON dosing_protocols(user_id);
CREATE INDEX IF NOT EXISTS idx_protocols_active ON dosing_protocols(is_active);

-- ============================================================================
-- Dose History (Append-mostly)
-- ============================================================================

CREATE TABLE IF NOT EXISTS dose_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    protocol_id TEXT REFERENCES dosing_protocols(id) ON DELETE SET NULL,
    substance_name TEXT NOT NULL,
    dose_value REAL NOT NULL,
    unit TEXT NOT NULL,                          -- mg, mcg, units, mL
    calculated_volume REAL NOT NULL,
    volume_ml REAL NOT NULL,
    syringe_type TEXT NOT NULL CHECK (syringe_type IN ('Standard', 'Insulin')),
    recommended_marking REAL,
    logged_at TEXT NOT NULL,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_dose_logs_user ON dose_logs(user_id);
CREATE INDEX IF NOT EXISTS idx_dose_logs_logged_at ON dose_logs(logged_at);
"#;
