use std::time::Duration;

use waypoint_middleware::FreeQuotaLedger;

const WINDOW: Duration = Duration::from_secs(3_600);

#[tokio::test(start_paused = true)]
async fn reserve_and_refund_over_reservation() {
    let ledger = FreeQuotaLedger::new(1_000, WINDOW);

    assert!(ledger.try_reserve(400));
    assert_eq!(ledger.remaining(), 600);

    let rec = ledger.reconcile(400, 250);
    assert!(rec.fully_free);
    assert_eq!(rec.free_units, 250);
    assert_eq!(rec.paid_units, 0);
    assert_eq!(ledger.remaining(), 750);
}

#[tokio::test(start_paused = true)]
async fn overrun_spills_into_paid_column() {
    let ledger = FreeQuotaLedger::new(500, WINDOW);

    assert!(ledger.try_reserve(400));
    // Actual usage 600: 400 reserved + 100 absorbed from the remaining 100,
    // then 100 paid.
    let rec = ledger.reconcile(400, 600);
    assert!(!rec.fully_free);
    assert_eq!(rec.free_units, 500);
    assert_eq!(rec.paid_units, 100);
    assert_eq!(ledger.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn insufficient_room_reserves_nothing() {
    let ledger = FreeQuotaLedger::new(100, WINDOW);
    assert!(!ledger.try_reserve(150));
    assert_eq!(ledger.remaining(), 100);
    assert!(!ledger.has_room(150));
    assert!(ledger.has_room(100));
}

#[tokio::test(start_paused = true)]
async fn release_refunds_failed_attempt() {
    let ledger = FreeQuotaLedger::new(100, WINDOW);
    assert!(ledger.try_reserve(80));
    ledger.release(80);
    assert_eq!(ledger.remaining(), 100);

    // Refunds never push remaining past the configured total.
    ledger.release(500);
    assert_eq!(ledger.remaining(), 100);
}

#[tokio::test(start_paused = true)]
async fn window_reset_restores_full_budget() {
    let ledger = FreeQuotaLedger::new(100, WINDOW);
    assert!(ledger.try_reserve(100));
    assert_eq!(ledger.remaining(), 0);
    assert!(ledger.reset_in() <= WINDOW);

    tokio::time::advance(WINDOW + Duration::from_secs(1)).await;
    assert_eq!(ledger.remaining(), 100);

    let snap = ledger.snapshot();
    assert_eq!(snap.total, 100);
    assert_eq!(snap.remaining, 100);
}

#[tokio::test(start_paused = true)]
async fn zero_total_models_no_free_tier() {
    let ledger = FreeQuotaLedger::new(0, WINDOW);
    assert!(!ledger.has_room(1));
    assert!(!ledger.try_reserve(1));
    assert_eq!(ledger.remaining(), 0);
}
