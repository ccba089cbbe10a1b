use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::Database;
use uuid::Uuid;

use engine::{
    AccountKind, Assignee, Engine, EngineError, EntryCategory, Equipment, EquipmentCategory,
    EquipmentStatus, Money, Ownership, RateUnit,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap()
}

async fn contractor_account(engine: &mut Engine) -> Uuid {
    engine
        .new_account("Patel Constructions", AccountKind::Contractor, t0())
        .await
        .unwrap()
}

async fn excavator(engine: &mut Engine) -> Uuid {
    engine
        .new_equipment(
            "JCB 3DX",
            EquipmentCategory::HeavyMachine,
            Ownership::Owned,
            Some(Money::new(500_00)),
            Some(RateUnit::PerDay),
            1,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn paused_time_is_not_billed() {
    // Per-day ₹500, assigned 50h with a 4h pause: 46h billable, 2 days.
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    engine
        .pause_rental(jcb, t0() + Duration::hours(26))
        .await
        .unwrap();
    engine
        .resume_rental(jcb, t0() + Duration::hours(30))
        .await
        .unwrap();

    let outcome = engine
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(50))
        .await
        .unwrap();

    assert_eq!(outcome.charge.total, Money::new(1_000_00));
    assert_eq!(outcome.charge.billed_units, 2);
    assert_eq!(outcome.charge.billable_seconds, 46 * 3_600);
    assert!(!outcome.charge.clock_skew);
    assert_eq!(engine.balance(contractor).unwrap(), Money::new(-1_000_00));
    assert_eq!(
        engine.equipment(jcb).unwrap().status,
        EquipmentStatus::Available
    );
}

#[tokio::test]
async fn hourly_rate_rounds_up_to_whole_hours() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let mixer = engine
        .new_equipment(
            "Concrete Mixer",
            EquipmentCategory::ToolEquipment,
            Ownership::Owned,
            None,
            None,
            1,
        )
        .await
        .unwrap();

    engine
        .assign_equipment(
            mixer,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(50_00),
            RateUnit::PerHour,
            t0(),
        )
        .await
        .unwrap();
    let outcome = engine
        .return_equipment(mixer, "manager-7", t0() + Duration::minutes(90))
        .await
        .unwrap();

    assert_eq!(outcome.charge.total, Money::new(100_00));
    assert_eq!(outcome.charge.billed_units, 2);
}

#[tokio::test]
async fn second_return_fails_and_bills_once() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();

    engine
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(10))
        .await
        .unwrap();
    let err = engine
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(10))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidState(_)));
    let rental_entries: Vec<_> = engine
        .entries_for(contractor, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.category == EntryCategory::RentalExpense)
        .collect();
    assert_eq!(rental_entries.len(), 1);
}

#[tokio::test]
async fn returning_while_paused_resumes_first() {
    // Paused at 10h and never resumed; returned at 20h bills 10h, 1 day.
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    engine
        .pause_rental(jcb, t0() + Duration::hours(10))
        .await
        .unwrap();

    let outcome = engine
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(20))
        .await
        .unwrap();

    assert_eq!(outcome.charge.billable_seconds, 10 * 3_600);
    assert_eq!(outcome.charge.total, Money::new(500_00));

    let history = engine.assignment_history(jcb).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_open());
    assert_eq!(history[0].pauses.len(), 1);
    assert!(history[0].pauses[0].resumed_at.is_some());
    assert_eq!(history[0].total_charge, Some(Money::new(500_00)));
}

#[tokio::test]
async fn project_rentals_bill_the_expense_account() {
    let mut engine = engine_with_db().await;
    let expense = engine
        .new_account("Tower B Expenses", AccountKind::Wallet, t0())
        .await
        .unwrap();
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Project {
                project_id: Uuid::new_v4(),
                expense_account_id: expense,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    let outcome = engine
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(5))
        .await
        .unwrap();

    let entries = engine.entries_for(expense, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, outcome.entry_id.unwrap());
    assert_eq!(entries[0].source_assignment_id, Some(outcome.assignment_id));
    assert_eq!(engine.balance(expense).unwrap(), Money::new(-500_00));
}

#[tokio::test]
async fn zero_rate_return_posts_no_entry() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let ladder = engine
        .new_equipment(
            "Ladder",
            EquipmentCategory::ToolEquipment,
            Ownership::Owned,
            None,
            None,
            1,
        )
        .await
        .unwrap();

    engine
        .assign_equipment(
            ladder,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::ZERO,
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    let outcome = engine
        .return_equipment(ladder, "manager-7", t0() + Duration::days(3))
        .await
        .unwrap();

    assert_eq!(outcome.entry_id, None);
    assert_eq!(outcome.charge.total, Money::ZERO);
    assert!(engine.entries_for(contractor, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn assigning_unavailable_equipment_conflicts() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;
    let assignee = Assignee::Contractor {
        account_id: contractor,
    };

    engine
        .assign_equipment(jcb, assignee, Money::new(500_00), RateUnit::PerDay, t0())
        .await
        .unwrap();
    let err = engine
        .assign_equipment(jcb, assignee, Money::new(500_00), RateUnit::PerDay, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn consumables_never_enter_the_state_machine() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let cement = engine
        .new_equipment(
            "Cement 50kg",
            EquipmentCategory::Consumable,
            Ownership::Owned,
            None,
            None,
            40,
        )
        .await
        .unwrap();

    let err = engine
        .assign_equipment(
            cement,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(10_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    assert_eq!(engine.adjust_consumable_quantity(cement, 10).await.unwrap(), 50);
    assert_eq!(
        engine.adjust_consumable_quantity(cement, -45).await.unwrap(),
        5
    );
    let err = engine
        .adjust_consumable_quantity(cement, -6)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn maintenance_blocks_assignment_but_not_vice_versa() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine.set_maintenance(jcb, true).await.unwrap();
    let err = engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    engine.set_maintenance(jcb, false).await.unwrap();
    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    let err = engine.set_maintenance(jcb, true).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn clock_skew_on_return_is_flagged_not_fatal() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    let outcome = engine
        .return_equipment(jcb, "manager-7", t0() - Duration::minutes(5))
        .await
        .unwrap();

    assert!(outcome.charge.clock_skew);
    assert_eq!(outcome.charge.total, Money::ZERO);
    assert_eq!(outcome.entry_id, None);
    assert_eq!(
        engine.equipment(jcb).unwrap().status,
        EquipmentStatus::Available
    );
}

#[tokio::test]
async fn paused_return_with_backwards_clock_still_returns() {
    // Paused at 10h but returned at 9h: the open pause closes at its own
    // start and the 9 active hours bill one day.
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    engine
        .pause_rental(jcb, t0() + Duration::hours(10))
        .await
        .unwrap();

    let outcome = engine
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(9))
        .await
        .unwrap();

    assert_eq!(outcome.charge.billable_seconds, 9 * 3_600);
    assert_eq!(outcome.charge.total, Money::new(500_00));
    assert_eq!(
        engine.equipment(jcb).unwrap().status,
        EquipmentStatus::Available
    );

    let history = engine.assignment_history(jcb).await.unwrap();
    assert_eq!(history[0].pauses[0].paused_seconds(t0() + Duration::hours(9)), 0);
}

#[tokio::test]
async fn paused_return_before_assignment_start_clamps_to_zero() {
    let mut engine = engine_with_db().await;
    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;

    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    engine
        .pause_rental(jcb, t0() + Duration::hours(2))
        .await
        .unwrap();

    let outcome = engine
        .return_equipment(jcb, "manager-7", t0() - Duration::minutes(5))
        .await
        .unwrap();

    assert!(outcome.charge.clock_skew);
    assert_eq!(outcome.charge.total, Money::ZERO);
    assert_eq!(outcome.entry_id, None);
}

#[tokio::test]
async fn open_assignments_survive_a_restart() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mut engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();

    let contractor = contractor_account(&mut engine).await;
    let jcb = excavator(&mut engine).await;
    engine
        .assign_equipment(
            jcb,
            Assignee::Contractor {
                account_id: contractor,
            },
            Money::new(500_00),
            RateUnit::PerDay,
            t0(),
        )
        .await
        .unwrap();
    engine
        .pause_rental(jcb, t0() + Duration::hours(26))
        .await
        .unwrap();
    engine
        .resume_rental(jcb, t0() + Duration::hours(30))
        .await
        .unwrap();
    drop(engine);

    let mut reloaded = Engine::builder().database(db).build().await.unwrap();
    let unit: &Equipment = reloaded.equipment(jcb).unwrap();
    assert_eq!(unit.status, EquipmentStatus::Assigned);
    let open = unit.open_assignment.as_ref().unwrap();
    assert_eq!(open.pauses.len(), 1);

    let outcome = reloaded
        .return_equipment(jcb, "manager-7", t0() + Duration::hours(50))
        .await
        .unwrap();
    assert_eq!(outcome.charge.total, Money::new(1_000_00));
    assert_eq!(reloaded.balance(contractor).unwrap(), Money::new(-1_000_00));
}
