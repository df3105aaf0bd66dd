//! Tests for opening the account database
//!
//! Run with: cargo test --test connection_retry_test -- --nocapture

use std::time::Instant;
use tempfile::TempDir;

use runaround_core::adapters::duckdb::DuckDbRepository;
use runaround_core::ports::AccountRepository;
use runaround_core::Account;

/// Opening, migrating and closing the same file repeatedly works and
/// migrations only run once
#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_sequential.duckdb");

    for i in 0..5 {
        let start = Instant::now();
        let repo = DuckDbRepository::new(&db_path).unwrap();
        let result = repo.run_migrations().unwrap();
        if i == 0 {
            assert_eq!(result.applied.len(), 3);
        } else {
            assert!(result.applied.is_empty(), "connection {} re-applied migrations", i);
        }
        println!("Connection {}: opened in {:?}", i, start.elapsed());
        // Connection dropped at end of loop
    }
}

/// Accounts written through one connection are visible after reopening
#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_reopen.duckdb");

    let account = Account::new("alice")
        .unwrap()
        .with_email("alice@example.com")
        .with_password("hunter2")
        .with_federated_id(42);

    {
        let repo = DuckDbRepository::new(&db_path).unwrap();
        repo.ensure_schema().unwrap();
        repo.upsert(&account).unwrap();
    }

    let repo = DuckDbRepository::new(&db_path).unwrap();
    repo.ensure_schema().unwrap();
    assert_eq!(repo.db_path(), Some(db_path.as_path()));
    assert_eq!(repo.find_by_username("alice").unwrap(), Some(account.clone()));
    assert_eq!(repo.find_by_federated_id(42).unwrap(), Some(account));
}

/// A path that cannot be a database fails without retrying forever
#[test]
fn test_open_failure_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    // A directory is not a database file
    let start = Instant::now();
    assert!(DuckDbRepository::new(temp_dir.path()).is_err());
    println!("Failed after {:?}", start.elapsed());
}
