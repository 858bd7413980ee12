//! Structural contract for every staging and warehouse table.
//!
//! Definitions are engine-neutral: a table is an ordered list of columns,
//! each with a semantic type and a set of constraints. The warehouse crate
//! renders them to ClickHouse DDL.
//!
//! - Staging tables mirror the raw JSON records, have no key and every
//!   column is nullable.
//! - Dimension tables are keyed by a single primary key and upserted.
//! - The fact table is keyed by an opaque surrogate and appended to.

/// Table names.
pub mod tables {
    pub const STAGING_EVENTS: &str = "staging_events";
    pub const STAGING_SONGS: &str = "staging_songs";
    pub const SONGPLAYS: &str = "songplays";
    pub const USERS: &str = "users";
    pub const SONGS: &str = "songs";
    pub const ARTISTS: &str = "artists";
    pub const TIME: &str = "time";
}

/// Column semantic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// Unbounded text
    Varchar,
    /// Single character
    Char,
    /// 32-bit integer
    Integer,
    /// 64-bit integer, wide enough for epoch milliseconds
    BigInt,
    /// Exact decimal
    Decimal,
    /// Double precision float
    Float,
    /// Millisecond instant with a time zone
    TimestampTz,
    /// System-assigned identifier with no business meaning
    Surrogate,
}

/// Column constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Unique key of a dimension or fact table. Implies `NotNull`.
    PrimaryKey,
    NotNull,
    /// Physical ordering/locality hint. Never relied upon for correctness.
    SortKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: SemanticType,
    pub constraints: &'static [Constraint],
}

impl ColumnDef {
    const fn new(name: &'static str, ty: SemanticType, constraints: &'static [Constraint]) -> Self {
        Self {
            name,
            ty,
            constraints,
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&Constraint::PrimaryKey)
    }

    pub fn is_not_null(&self) -> bool {
        self.is_primary_key() || self.constraints.contains(&Constraint::NotNull)
    }

    pub fn is_sort_key(&self) -> bool {
        self.constraints.contains(&Constraint::SortKey)
    }
}

/// Table layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Truncate-and-reload landing table.
    Staging,
    /// Keyed, merged on every run.
    Dimension,
    /// Append-only.
    Fact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub kind: TableKind,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    /// The primary key column. Staging tables have none.
    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    /// Sort key columns in declaration order.
    pub fn sort_keys(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.is_sort_key())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

use Constraint::{NotNull, PrimaryKey, SortKey};
use SemanticType::*;

const NONE: &[Constraint] = &[];

/// Raw event log records. Field names match the JSON keys.
///
/// `userId` is text: the log quotes it, and logged-out events carry an
/// empty string. The transforms convert it.
pub const STAGING_EVENTS_TABLE: TableDef = TableDef {
    name: tables::STAGING_EVENTS,
    kind: TableKind::Staging,
    columns: &[
        ColumnDef::new("artist", Varchar, NONE),
        ColumnDef::new("auth", Varchar, NONE),
        ColumnDef::new("firstName", Varchar, NONE),
        ColumnDef::new("gender", Char, NONE),
        ColumnDef::new("itemInSession", Integer, NONE),
        ColumnDef::new("lastName", Varchar, NONE),
        ColumnDef::new("length", Decimal, NONE),
        ColumnDef::new("level", Varchar, NONE),
        ColumnDef::new("location", Varchar, NONE),
        ColumnDef::new("method", Varchar, NONE),
        ColumnDef::new("page", Varchar, NONE),
        ColumnDef::new("registration", Decimal, NONE),
        ColumnDef::new("sessionId", Integer, NONE),
        ColumnDef::new("song", Varchar, NONE),
        ColumnDef::new("status", Integer, NONE),
        ColumnDef::new("ts", BigInt, NONE),
        ColumnDef::new("userAgent", Varchar, NONE),
        ColumnDef::new("userId", Varchar, NONE),
    ],
};

/// Raw song catalog records.
pub const STAGING_SONGS_TABLE: TableDef = TableDef {
    name: tables::STAGING_SONGS,
    kind: TableKind::Staging,
    columns: &[
        ColumnDef::new("num_songs", Integer, NONE),
        ColumnDef::new("artist_id", Varchar, NONE),
        ColumnDef::new("artist_latitude", Decimal, NONE),
        ColumnDef::new("artist_longitude", Decimal, NONE),
        ColumnDef::new("artist_location", Varchar, NONE),
        ColumnDef::new("artist_name", Varchar, NONE),
        ColumnDef::new("song_id", Varchar, NONE),
        ColumnDef::new("title", Varchar, NONE),
        ColumnDef::new("duration", Decimal, NONE),
        ColumnDef::new("year", Float, NONE),
    ],
};

pub const SONGPLAYS_TABLE: TableDef = TableDef {
    name: tables::SONGPLAYS,
    kind: TableKind::Fact,
    columns: &[
        ColumnDef::new("songplay_id", Surrogate, &[PrimaryKey]),
        ColumnDef::new("start_time", TimestampTz, &[NotNull, SortKey]),
        ColumnDef::new("user_id", Integer, &[NotNull]),
        ColumnDef::new("level", Varchar, NONE),
        ColumnDef::new("song_id", Varchar, NONE),
        ColumnDef::new("artist_id", Varchar, NONE),
        ColumnDef::new("session_id", Integer, NONE),
        ColumnDef::new("location", Varchar, NONE),
        ColumnDef::new("user_agent", Varchar, NONE),
    ],
};

pub const USERS_TABLE: TableDef = TableDef {
    name: tables::USERS,
    kind: TableKind::Dimension,
    columns: &[
        ColumnDef::new("user_id", Integer, &[PrimaryKey, SortKey]),
        ColumnDef::new("first_name", Varchar, NONE),
        ColumnDef::new("last_name", Varchar, NONE),
        ColumnDef::new("gender", Varchar, NONE),
        ColumnDef::new("level", Varchar, NONE),
    ],
};

pub const SONGS_TABLE: TableDef = TableDef {
    name: tables::SONGS,
    kind: TableKind::Dimension,
    columns: &[
        ColumnDef::new("song_id", Varchar, &[PrimaryKey, SortKey]),
        ColumnDef::new("title", Varchar, NONE),
        ColumnDef::new("artist_id", Varchar, &[NotNull]),
        ColumnDef::new("year", Integer, NONE),
        ColumnDef::new("duration", Decimal, NONE),
    ],
};

pub const ARTISTS_TABLE: TableDef = TableDef {
    name: tables::ARTISTS,
    kind: TableKind::Dimension,
    columns: &[
        ColumnDef::new("artist_id", Varchar, &[PrimaryKey, SortKey]),
        ColumnDef::new("name", Varchar, NONE),
        ColumnDef::new("location", Varchar, NONE),
        ColumnDef::new("latitude", Decimal, NONE),
        ColumnDef::new("longitude", Decimal, NONE),
    ],
};

/// Calendar decomposition of every distinct event instant.
///
/// `weekday` is the ISO day of week (1 = Monday .. 7 = Sunday).
pub const TIME_TABLE: TableDef = TableDef {
    name: tables::TIME,
    kind: TableKind::Dimension,
    columns: &[
        ColumnDef::new("start_time", TimestampTz, &[PrimaryKey, SortKey]),
        ColumnDef::new("hour", Integer, NONE),
        ColumnDef::new("day", Integer, NONE),
        ColumnDef::new("week", Integer, NONE),
        ColumnDef::new("month", Integer, NONE),
        ColumnDef::new("year", Integer, NONE),
        ColumnDef::new("weekday", Integer, NONE),
    ],
};

static ALL_TABLES: [&TableDef; 7] = [
    &STAGING_EVENTS_TABLE,
    &STAGING_SONGS_TABLE,
    &SONGPLAYS_TABLE,
    &USERS_TABLE,
    &SONGS_TABLE,
    &ARTISTS_TABLE,
    &TIME_TABLE,
];

/// All table definitions, staging first.
///
/// This is the order used for both create and drop.
pub fn all_tables() -> &'static [&'static TableDef] {
    &ALL_TABLES
}

/// Look up a table definition by name.
pub fn table(name: &str) -> Option<&'static TableDef> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}
