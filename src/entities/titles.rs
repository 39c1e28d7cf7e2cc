use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "titles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub year: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub category_id: Option<i32>,

    /// Mean review score, maintained on every review write
    pub rating: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::title_genres::Entity")]
    TitleGenres,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::title_genres::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TitleGenres.def()
    }
}

impl Related<super::genres::Entity> for Entity {
    fn to() -> RelationDef {
        super::title_genres::Relation::Genre.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::title_genres::Relation::Title.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
