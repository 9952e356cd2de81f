//! Mission entity - Catalog of one-time-per-user achievements.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mission database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "missions")]
pub struct Model {
    /// Unique identifier for the mission
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable identifier used by callers (e.g. `"first_upload"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Human-readable title
    pub title: String,
    /// Longer description shown in the missions list
    pub description: String,
    /// Points awarded on completion
    pub points: i64,
    /// Display ordering
    pub sort_order: i32,
    /// Inactive missions are invisible and cannot be completed
    pub is_active: bool,
}

/// Defines relationships between Mission and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One mission has many per-user completions
    #[sea_orm(has_many = "super::mission_completion::Entity")]
    Completions,
}

impl Related<super::mission_completion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Completions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
