//! ClickHouse side of the songplay ELT: DDL, bulk loads from object
//! storage, and the staging → star schema transforms.

pub mod client;
pub mod config;
pub mod ddl;
pub mod health;
pub mod load;
pub mod pipeline;
pub mod query;
pub mod statement;
pub mod transform;

pub use client::*;
pub use config::*;
pub use ddl::{create_all, drop_all};
pub use load::{load, load_all, load_plan, LoadReport, SourceFormat, StagingLoad, TimeFormat};
pub use pipeline::{run_stages, RunReport, Stage};
pub use statement::*;
pub use transform::{
    insert_songplays, transform_all, upsert_artists, upsert_songs, upsert_time, upsert_users,
    TransformReport,
};
