use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Next playlist position per station; only ever moves forward
        manager
            .alter_table(
                Table::alter()
                    .table("radio_stations")
                    .add_column(
                        ColumnDef::new("next_order")
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"UPDATE radio_stations
                   SET next_order = COALESCE(
                       (SELECT MAX("order") + 1 FROM station_tracks
                        WHERE station_tracks.station_id = radio_stations.id),
                       1
                   )"#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table("radio_stations")
                    .drop_column("next_order")
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
