use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create artists table
        manager
            .create_table(
                Table::create()
                    .table(Artist::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Artist::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Artist::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Artist::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Artist::Genre).string_len(100))
                    .col(ColumnDef::new(Artist::Bio).string_len(2000))
                    .col(ColumnDef::new(Artist::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Artist::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Create tracks table
        manager
            .create_table(
                Table::create()
                    .table(Track::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Track::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Track::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Track::ArtistId).uuid().not_null())
                    .col(ColumnDef::new(Track::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Track::DurationSeconds).integer().not_null())
                    .col(ColumnDef::new(Track::FilePath).string_len(512).not_null())
                    .col(ColumnDef::new(Track::FileSize).big_integer().not_null())
                    .col(
                        ColumnDef::new(Track::FileFormat)
                            .string_len(10)
                            .not_null()
                            .default("mp3"),
                    )
                    .col(ColumnDef::new(Track::SourceUrl).string())
                    .col(ColumnDef::new(Track::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Track::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracks_artist_id")
                            .from(Track::Table, Track::ArtistId)
                            .to(Artist::Table, Artist::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Artist names and storage keys are unique per tenant
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_artists_tenant_name")
                    .table(Artist::Table)
                    .col(Artist::TenantId)
                    .col(Artist::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_tracks_tenant_file_path")
                    .table(Track::Table)
                    .col(Track::TenantId)
                    .col(Track::FilePath)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracks_artist_id")
                    .table(Track::Table)
                    .col(Track::ArtistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracks_title")
                    .table(Track::Table)
                    .col(Track::Title)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Track::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Artist::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Artist {
    #[sea_orm(iden = "artists")]
    Table,
    Id,
    TenantId,
    Name,
    Genre,
    Bio,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Track {
    #[sea_orm(iden = "tracks")]
    Table,
    Id,
    TenantId,
    ArtistId,
    Title,
    DurationSeconds,
    FilePath,
    FileSize,
    FileFormat,
    SourceUrl,
    CreatedAt,
    UpdatedAt,
}
