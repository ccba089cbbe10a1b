pub use sea_orm_migration::prelude::*;

mod m20260810_090000_accounts;
mod m20260810_091500_equipment;
mod m20260810_093000_ledger_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_090000_accounts::Migration),
            Box::new(m20260810_091500_equipment::Migration),
            Box::new(m20260810_093000_ledger_entries::Migration),
        ]
    }
}
