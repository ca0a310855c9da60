use core::error::EtlError;

use crate::common::{sales_source, Harness};

/// Scenario 1 (spec.md §8): a well-formed delimited file with two rows
/// processes cleanly, lands both rows in the target, and leaves the
/// source file archived rather than still sitting in intake.
#[tokio::test]
async fn happy_delimited_file_is_fully_processed() {
    let harness = Harness::new(vec![sales_source("sales_happy")]).await;
    let path = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\n\
         TXN001,CUST1,2,19.98,2024-01-15\n\
         TXN002,CUST2,1,9.99,2024-01-16\n",
    );

    let outcome = harness.process(&path).await;
    match outcome {
        conductor::FileOutcome::Processed { inserts, updates } => {
            assert_eq!(inserts, 2);
            assert_eq!(updates, 0);
        }
        other => panic!("expected Processed, got {other:?}"),
    }

    assert_eq!(harness.row_count("sales_happy").await, 2);
    assert!(!path.exists(), "source file should be removed from intake");
    assert!(harness.config.archive_dir.join("sales_2024.csv").exists());
    assert!(harness.stage_tables().await.is_empty(), "stage table must not survive a completed run");
}

/// Scenario 2: an empty delimited file (no readable header) fails with
/// `MissingHeader` and creates no stage table.
#[tokio::test]
async fn empty_file_fails_with_missing_header() {
    let harness = Harness::new(vec![sales_source("sales_missing_header")]).await;
    let path = harness.write_intake_file("sales_2024.csv", "");

    let outcome = harness.process(&path).await;
    match outcome {
        conductor::FileOutcome::Failed(EtlError::MissingHeader { .. }) => {}
        other => panic!("expected Failed(MissingHeader), got {other:?}"),
    }

    assert_eq!(harness.row_count("sales_missing_header").await, 0);
    assert!(harness.stage_tables().await.is_empty());
}

/// Scenario 3: header present but missing a required column fails with
/// `MissingColumns` naming the gap.
#[tokio::test]
async fn header_missing_a_required_column_fails_with_missing_columns() {
    let harness = Harness::new(vec![sales_source("sales_missing_columns")]).await;
    let path = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,sale_date\nTXN001,CUST1,2,2024-01-15\n",
    );

    let outcome = harness.process(&path).await;
    match outcome {
        conductor::FileOutcome::Failed(EtlError::MissingColumns { missing, .. }) => {
            assert!(missing.iter().any(|c| c == "total_amount"), "missing set was {missing:?}");
        }
        other => panic!("expected Failed(MissingColumns), got {other:?}"),
    }
}

/// Scenario 4: two rows sharing the same grain pass row-level validation
/// but fail the auditor's grain-uniqueness check.
#[tokio::test]
async fn duplicate_grain_values_fail_the_audit() {
    let harness = Harness::new(vec![sales_source("sales_dup_grain")]).await;
    let path = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\n\
         TXN001,CUST1,2,19.98,2024-01-15\n\
         TXN001,CUST2,1,9.99,2024-01-16\n",
    );

    let outcome = harness.process(&path).await;
    match outcome {
        conductor::FileOutcome::Failed(EtlError::GrainValidation { detail, .. }) => {
            assert!(detail.contains("transaction_id: TXN001"), "detail was {detail:?}");
            assert!(detail.contains("duplicate_count: 2"), "detail was {detail:?}");
        }
        other => panic!("expected Failed(GrainValidation), got {other:?}"),
    }

    assert_eq!(harness.row_count("sales_dup_grain").await, 0, "a failed audit must not merge any rows");
    assert!(harness.stage_tables().await.is_empty());
}

/// Scenario 5: resubmitting the same filename after a successful prior
/// run is diverted to the duplicates directory, and the target's row
/// count is unchanged by the second attempt.
#[tokio::test]
async fn resubmitting_a_processed_filename_is_treated_as_a_duplicate() {
    let harness = Harness::new(vec![sales_source("sales_dup_file")]).await;
    let contents = "transaction_id,customer_id,quantity,total_amount,sale_date\nTXN001,CUST1,2,19.98,2024-01-15\n";

    let first = harness.write_intake_file("sales_2024.csv", contents);
    harness.process(&first).await;
    assert_eq!(harness.row_count("sales_dup_file").await, 1);

    let second = harness.write_intake_file("sales_2024.csv", contents);
    let outcome = harness.process(&second).await;

    assert!(matches!(outcome, conductor::FileOutcome::Duplicate));
    assert_eq!(harness.row_count("sales_dup_file").await, 1, "a duplicate submission must not change target row count");
    assert!(!second.exists());
    assert!(harness.config.duplicates_dir.join("sales_2024.csv").exists());
}

/// Scenario 6: with a permissive threshold, a file with two bad rows out
/// of four still processes - the two good rows merge into the target,
/// and the two bad rows land in the DLQ against their original row
/// numbers and failing columns.
#[tokio::test]
async fn mixed_valid_and_invalid_rows_route_failures_to_the_dead_letter_queue() {
    let source = sales_source("sales_mixed").with_validation_threshold(1.0);
    let harness = Harness::new(vec![source]).await;

    let path = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\n\
         TXN001,CUST1,2,19.98,2024-01-15\n\
         TXN002,CUST2,not_a_number,9.99,2024-01-16\n\
         TXN003,CUST3,3,29.97,2024-01-17\n\
         TXN004,CUST4,1,9.99,invalid_date\n",
    );

    let outcome = harness.process(&path).await;
    match outcome {
        conductor::FileOutcome::Processed { inserts, updates } => {
            assert_eq!(inserts, 2);
            assert_eq!(updates, 0);
        }
        other => panic!("expected Processed, got {other:?}"),
    }

    assert_eq!(harness.row_count("sales_mixed").await, 2);
    assert_eq!(harness.dlq_row_numbers("sales_2024.csv").await, vec![2, 4]);
}

/// Threshold law: a file whose failure rate exceeds its declared
/// threshold terminates with `ValidationThresholdExceeded` and leaves no
/// stage rows (because no stage table survives a completed pipeline run
/// at all).
#[tokio::test]
async fn exceeding_the_validation_threshold_aborts_before_staging() {
    let source = sales_source("sales_threshold").with_validation_threshold(0.1);
    let harness = Harness::new(vec![source]).await;

    let path = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\n\
         TXN001,CUST1,not_a_number,19.98,2024-01-15\n\
         TXN002,CUST2,1,9.99,2024-01-16\n",
    );

    let outcome = harness.process(&path).await;
    match outcome {
        conductor::FileOutcome::Failed(EtlError::ValidationThresholdExceeded { failed, processed, .. }) => {
            assert_eq!(failed, 1);
            assert_eq!(processed, 2);
        }
        other => panic!("expected Failed(ValidationThresholdExceeded), got {other:?}"),
    }

    assert_eq!(harness.row_count("sales_threshold").await, 0);
    assert!(harness.stage_tables().await.is_empty());
}

/// Hash-driven update: reprocessing a file with the same grain but a
/// changed non-grain column (after deleting the original from the
/// duplicate-file table so it isn't short-circuited) produces an update,
/// not a second inserted row.
#[tokio::test]
async fn reprocessing_changed_rows_updates_rather_than_duplicates() {
    let harness = Harness::new(vec![sales_source("sales_hash_update")]).await;

    let first = harness.write_intake_file(
        "sales_2024_a.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\nTXN001,CUST1,2,19.98,2024-01-15\n",
    );
    harness.process(&first).await;

    let second = harness.write_intake_file(
        "sales_2024_b.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\nTXN001,CUST1,4,39.96,2024-01-15\n",
    );
    let outcome = harness.process(&second).await;

    match outcome {
        conductor::FileOutcome::Processed { inserts, updates } => {
            assert_eq!(inserts, 0);
            assert_eq!(updates, 1);
        }
        other => panic!("expected Processed, got {other:?}"),
    }

    assert_eq!(harness.row_count("sales_hash_update").await, 1, "the grain must stay unique after the update");
}

/// DLQ monotonicity (spec.md §8): a file's first attempt fails after its
/// dead letters are already durable (a row-level coercion failure lands
/// in the DLQ, but a later duplicate grain aborts the run at audit, so
/// nothing merges and the filename stays eligible for reprocessing).
/// Once a later, corrected attempt under the same filename merges
/// cleanly, the DLQ must retain only that latest run's rows for the
/// filename - here, none, since the corrected attempt has no failures.
#[tokio::test]
async fn a_successful_reprocess_purges_the_prior_runs_dead_letters() {
    let source = sales_source("sales_dlq_monotonic").with_validation_threshold(1.0);
    let harness = Harness::new(vec![source]).await;

    let first = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\n\
         TXN001,CUST1,2,19.98,2024-01-15\n\
         TXN002,CUST2,not_a_number,9.99,2024-01-16\n\
         TXN001,CUST3,1,9.99,2024-01-17\n",
    );
    let first_outcome = harness.process(&first).await;
    match first_outcome {
        conductor::FileOutcome::Failed(EtlError::GrainValidation { .. }) => {}
        other => panic!("expected the first attempt to fail the grain audit, got {other:?}"),
    }
    assert_eq!(
        harness.dlq_row_numbers("sales_2024.csv").await,
        vec![2],
        "the row-level failure must be durable even though the run as a whole failed later"
    );

    let second = harness.write_intake_file(
        "sales_2024.csv",
        "transaction_id,customer_id,quantity,total_amount,sale_date\n\
         TXN001,CUST1,2,19.98,2024-01-15\n\
         TXN002,CUST2,3,29.97,2024-01-16\n",
    );
    let second_outcome = harness.process(&second).await;
    match second_outcome {
        conductor::FileOutcome::Processed { inserts, updates } => {
            assert_eq!(inserts, 2);
            assert_eq!(updates, 0);
        }
        other => panic!("expected the corrected attempt to process cleanly, got {other:?}"),
    }

    assert!(
        harness.dlq_row_numbers("sales_2024.csv").await.is_empty(),
        "the prior run's dead letter must not survive a clean reprocess"
    );
}
