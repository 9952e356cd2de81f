//! Mission completion entity - Join row marking a mission done for a user.
//!
//! A composite unique index on `(user_id, mission_id)` (created in
//! `config::database::create_tables`) is the idempotency guard: at most one
//! caller can insert the pair, so points are awarded at most once even under
//! concurrent completion attempts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mission completion database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mission_completions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who completed the mission
    pub user_id: i64,
    /// The completed mission
    pub mission_id: i64,
    /// When the completion was recorded
    pub completed_at: DateTimeUtc,
}

/// Defines relationships between `MissionCompletion` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each completion belongs to one mission
    #[sea_orm(
        belongs_to = "super::mission::Entity",
        from = "Column::MissionId",
        to = "super::mission::Column::Id"
    )]
    Mission,
}

impl Related<super::mission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
