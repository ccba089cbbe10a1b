use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Equipment {
    Table,
    Id,
    Name,
    Category,
    Ownership,
    Status,
    DefaultRateMinor,
    DefaultRateUnit,
    Quantity,
}

#[derive(Iden)]
pub enum RentalAssignments {
    Table,
    Id,
    EquipmentId,
    AssigneeKind,
    AssigneeId,
    ExpenseAccountId,
    RateMinor,
    RateUnit,
    StartedAt,
    EndedAt,
    TotalChargeMinor,
}

#[derive(Iden)]
enum PauseIntervals {
    Table,
    Id,
    AssignmentId,
    PausedAt,
    ResumedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Equipment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Equipment::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Equipment::Name).string().not_null())
                    .col(ColumnDef::new(Equipment::Category).string().not_null())
                    .col(ColumnDef::new(Equipment::Ownership).string().not_null())
                    .col(ColumnDef::new(Equipment::Status).string().not_null())
                    .col(ColumnDef::new(Equipment::DefaultRateMinor).big_integer())
                    .col(ColumnDef::new(Equipment::DefaultRateUnit).string())
                    .col(ColumnDef::new(Equipment::Quantity).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RentalAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RentalAssignments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RentalAssignments::EquipmentId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalAssignments::AssigneeKind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalAssignments::AssigneeId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RentalAssignments::ExpenseAccountId).string())
                    .col(
                        ColumnDef::new(RentalAssignments::RateMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalAssignments::RateUnit)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RentalAssignments::StartedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RentalAssignments::EndedAt).timestamp())
                    .col(ColumnDef::new(RentalAssignments::TotalChargeMinor).big_integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rental_assignments-equipment_id")
                            .from(RentalAssignments::Table, RentalAssignments::EquipmentId)
                            .to(Equipment::Table, Equipment::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-rental_assignments-equipment_id-started_at")
                    .table(RentalAssignments::Table)
                    .col(RentalAssignments::EquipmentId)
                    .col(RentalAssignments::StartedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PauseIntervals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PauseIntervals::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PauseIntervals::AssignmentId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PauseIntervals::PausedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PauseIntervals::ResumedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pause_intervals-assignment_id")
                            .from(PauseIntervals::Table, PauseIntervals::AssignmentId)
                            .to(RentalAssignments::Table, RentalAssignments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-pause_intervals-assignment_id")
                    .table(PauseIntervals::Table)
                    .col(PauseIntervals::AssignmentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PauseIntervals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RentalAssignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Equipment::Table).to_owned())
            .await?;
        Ok(())
    }
}
