pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_catalog_tables;
mod m20260301_000002_create_station_tables;
mod m20260315_000003_add_station_next_order;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_catalog_tables::Migration),
            Box::new(m20260301_000002_create_station_tables::Migration),
            Box::new(m20260315_000003_add_station_next_order::Migration),
        ]
    }
}
