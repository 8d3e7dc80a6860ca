use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_catalog_tables::Track;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RadioStation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RadioStation::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RadioStation::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(RadioStation::Type).string_len(16).not_null())
                    .col(ColumnDef::new(RadioStation::Genre).string_len(100))
                    .col(ColumnDef::new(RadioStation::Description).string_len(1000))
                    .col(
                        ColumnDef::new(RadioStation::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RadioStation::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RadioStation::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Ordered playlist links between stations and tracks
        manager
            .create_table(
                Table::create()
                    .table(StationTrack::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StationTrack::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StationTrack::StationId).uuid().not_null())
                    .col(ColumnDef::new(StationTrack::TrackId).uuid().not_null())
                    .col(
                        ColumnDef::new(StationTrack::Order)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StationTrack::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StationTrack::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_station_tracks_station_id")
                            .from(StationTrack::Table, StationTrack::StationId)
                            .to(RadioStation::Table, RadioStation::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_station_tracks_track_id")
                            .from(StationTrack::Table, StationTrack::TrackId)
                            .to(Track::Table, Track::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_station_track")
                    .table(StationTrack::Table)
                    .col(StationTrack::StationId)
                    .col(StationTrack::TrackId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_station_track_order")
                    .table(StationTrack::Table)
                    .col(StationTrack::StationId)
                    .col(StationTrack::Order)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_station_tracks_track_id")
                    .table(StationTrack::Table)
                    .col(StationTrack::TrackId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(StationTrack::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RadioStation::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum RadioStation {
    #[sea_orm(iden = "radio_stations")]
    Table,
    Id,
    Name,
    Type,
    Genre,
    Description,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StationTrack {
    #[sea_orm(iden = "station_tracks")]
    Table,
    Id,
    StationId,
    TrackId,
    Order,
    CreatedAt,
    UpdatedAt,
}
