mod common;

use common::{customer_repo, Customer};
use repobase_core::{PersistenceContext, Predicate, RepoError, Repository, TransactionState};

#[test]
fn save_then_get_by_key_roundtrip() {
    let mut repo = customer_repo();
    let customer = Customer::new("Ada", Some("Lyon"), 40);

    assert!(repo.save(&customer).unwrap());

    let loaded = repo
        .get(&Predicate::key_of(&customer))
        .unwrap()
        .expect("saved customer should load");
    assert_eq!(loaded, customer);
    assert_eq!(repo.context().tracked_len(), 0);
}

#[test]
fn get_missing_row_is_none() {
    let repo = customer_repo();
    let found = repo.get(&Predicate::eq("name", "nobody".to_string())).unwrap();
    assert_eq!(found, None);
}

#[test]
fn get_with_two_matches_is_ambiguous() {
    let mut repo = customer_repo();
    repo.save(&Customer::new("Twin", Some("Oslo"), 1)).unwrap();
    repo.save(&Customer::new("Twin", Some("Oslo"), 2)).unwrap();

    let err = repo
        .get(&Predicate::eq("name", "Twin".to_string()))
        .unwrap_err();
    match err {
        RepoError::AmbiguousResult {
            operation,
            entity,
            matched,
        } => {
            assert_eq!(operation, "get");
            assert_eq!(entity, "Customer");
            assert_eq!(matched, 2);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn update_is_visible_to_untracked_read() {
    let mut repo = customer_repo();
    let mut customer = Customer::new("Grace", None, 10);
    repo.save(&customer).unwrap();

    customer.city = Some("Paris".to_string());
    customer.credit = 25;
    assert!(repo.update(&customer).unwrap());
    assert_eq!(repo.context().tracked_len(), 0);

    let loaded = repo.get(&Predicate::key_of(&customer)).unwrap().unwrap();
    assert_eq!(loaded.city.as_deref(), Some("Paris"));
    assert_eq!(loaded.credit, 25);
}

#[test]
fn update_of_missing_row_reports_false() {
    let mut repo = customer_repo();
    let ghost = Customer::new("Ghost", None, 0);
    assert!(!repo.update(&ghost).unwrap());
}

#[test]
fn save_or_update_dispatches_on_edit_flag() {
    let mut repo = customer_repo();
    let mut customer = Customer::new("Linus", Some("Helsinki"), 5);

    assert!(repo.save_or_update(&customer, false).unwrap());
    customer.credit = 6;
    assert!(repo.save_or_update(&customer, true).unwrap());

    let loaded = repo.get(&Predicate::key_of(&customer)).unwrap().unwrap();
    assert_eq!(loaded.credit, 6);
}

#[test]
fn delete_by_predicate_and_delete_all() {
    let mut repo = customer_repo();
    common::seed_customers(&mut repo, 6);

    let removed = repo
        .delete(Some(&Predicate::eq("city", "Lyon".to_string())))
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(repo.context().tracked_len(), 0);

    assert_eq!(repo.delete(None).unwrap(), 3);
    assert!(repo.load_all(None, &[]).unwrap().is_empty());
}

#[test]
fn failed_save_leaves_entry_pending_and_propagates() {
    let mut repo = customer_repo();
    let broken = Customer::new("Broke", None, -1);

    let err = repo.save(&broken).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Persistence {
            operation: "save",
            entity: "Customer",
            ..
        }
    ));
    assert_eq!(repo.context().tracked_len(), 1);
    assert_eq!(repo.transaction_state(), TransactionState::Active);
}

#[test]
fn delete_after_failed_clashing_save_removes_row() {
    let mut repo = customer_repo();
    let kept = Customer::new("Kept", Some("Lyon"), 3);
    repo.save(&kept).unwrap();
    repo.commit().unwrap();

    let mut clash = kept.clone();
    clash.name = "Clash".to_string();
    assert!(repo.save(&clash).is_err());
    assert_eq!(repo.context().tracked_len(), 1);

    assert_eq!(repo.delete(Some(&Predicate::key_of(&kept))).unwrap(), 1);
    assert_eq!(repo.context().tracked_len(), 0);
    assert!(repo.get(&Predicate::key_of(&kept)).unwrap().is_none());
}

#[test]
fn update_after_failed_clashing_save_updates_row() {
    let mut repo = customer_repo();
    let mut kept = Customer::new("Kept", Some("Lyon"), 3);
    repo.save(&kept).unwrap();
    repo.commit().unwrap();

    assert!(repo.save(&kept).is_err());

    kept.credit = 9;
    assert!(repo.update(&kept).unwrap());
    assert_eq!(repo.context().tracked_len(), 0);

    let loaded = repo.get(&Predicate::key_of(&kept)).unwrap().unwrap();
    assert_eq!(loaded.credit, 9);
}

#[test]
fn is_exist_checks_without_loading() {
    let mut repo = customer_repo();
    repo.save(&Customer::new("Edsger", Some("Austin"), 3)).unwrap();

    assert!(repo
        .is_exist(&Predicate::eq("city", "Austin".to_string()))
        .unwrap());
    assert!(!repo
        .is_exist(&Predicate::gt("credit", 100_i64))
        .unwrap());
}

#[test]
fn load_all_filters_and_orders() {
    let mut repo = customer_repo();
    common::seed_customers(&mut repo, 5);

    let rich = repo
        .load_all(
            Some(&Predicate::ge("credit", 3_i64)),
            &[repobase_core::OrderBy::desc("credit")],
        )
        .unwrap();
    let credits = rich.iter().map(|customer| customer.credit).collect::<Vec<_>>();
    assert_eq!(credits, vec![5, 4, 3]);
}

#[test]
fn invalid_column_name_is_rejected_before_execution() {
    let repo = customer_repo();
    let err = repo
        .get(&Predicate::eq("name; DROP TABLE customers", "x".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Persistence {
            source: repobase_core::PersistenceError::InvalidIdentifier(_),
            ..
        }
    ));
}
