#![cfg(feature = "sqlite")]

use std::path::PathBuf;
use taxi_repo::sqlite::SqliteRepo;
use taxi_types::domain::order::{NewOrder, OrderStatus, Transition, TransitionOutcome};
use taxi_types::domain::user::{Gender, NewUser, Role};
use taxi_types::ports::order_repository::{OrderRepository, Window};
use taxi_types::ports::user_repository::UserRepository;
use taxi_types::ports::RepoError;
use uuid::Uuid;

fn temp_db_url() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut path = PathBuf::from(dir.path());
    path.push(format!("taxi-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    (dir, url)
}

fn new_user(phone: &str, role: Role) -> NewUser {
    NewUser::new(
        phone.into(),
        role,
        Some("Test".into()),
        Some(Gender::Male),
        Some(41),
        (role == Role::TaxiDriver).then(|| "Lada".to_string()),
        "hash".into(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_repo_user_flow() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();

    let created = repo
        .create_user(new_user("+1000", Role::TaxiDriver))
        .await
        .unwrap();
    assert!(created.is_active);
    assert!(!created.is_staff);

    let fetched = repo.get_user(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.car_model.as_deref(), Some("Lada"));
    assert_eq!(fetched.gender, Some(Gender::Male));

    let dup = repo.create_user(new_user("+1000", Role::Customer)).await;
    assert!(matches!(dup, Err(RepoError::Duplicate(_))));

    assert!(repo.find_by_phone("+1000").await.unwrap().is_some());
    assert!(repo.find_by_phone("+9999").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_repo_order_flow() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let customer = repo
        .create_user(new_user("+1000", Role::Customer))
        .await
        .unwrap();
    let driver = repo
        .create_user(new_user("+2000", Role::TaxiDriver))
        .await
        .unwrap();

    let first = repo
        .create_order(NewOrder::new(customer.id, "A".into(), "B".into()).unwrap())
        .await
        .unwrap();
    let second = repo
        .create_order(NewOrder::new(customer.id, "C".into(), "D".into()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status, OrderStatus::Waiting);
    assert_eq!(first.taxi_driver, None);

    let history = repo.list_by_customer(customer.id).await.unwrap();
    assert_eq!(history, vec![second.clone(), first.clone()]);

    let outcome = repo
        .transition(first.id, Transition::Accept { driver: driver.id })
        .await
        .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Applied(ref o) if o.taxi_driver == Some(driver.id)));

    let waiting = repo
        .list_by_status(OrderStatus::Waiting, None)
        .await
        .unwrap();
    assert_eq!(waiting, vec![second.clone()]);
    assert_eq!(repo.count_by_status(OrderStatus::Waiting).await.unwrap(), 1);
    assert_eq!(repo.count_by_status(OrderStatus::Accepted).await.unwrap(), 1);

    let empty_page = repo
        .list_by_status(OrderStatus::Waiting, Some(Window { offset: 1, limit: 10 }))
        .await
        .unwrap();
    assert!(empty_page.is_empty());
}

#[tokio::test]
async fn sqlite_repo_rejects_transitions_out_of_terminal_states() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let customer = repo
        .create_user(new_user("+1000", Role::Customer))
        .await
        .unwrap();
    let order = repo
        .create_order(NewOrder::new(customer.id, "A".into(), "B".into()).unwrap())
        .await
        .unwrap();

    let canceled = repo.transition(order.id, Transition::Cancel).await.unwrap();
    assert!(matches!(canceled, TransitionOutcome::Applied(_)));

    let again = repo.transition(order.id, Transition::Cancel).await.unwrap();
    match again {
        TransitionOutcome::Rejected(current) => assert_eq!(current.status, OrderStatus::Canceled),
        other => panic!("unexpected outcome {other:?}"),
    }

    let missing = repo.transition(4242, Transition::Cancel).await.unwrap();
    assert!(matches!(missing, TransitionOutcome::Missing));
    assert!(repo.get_order(4242).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_repo_concurrent_accepts_have_one_winner() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let customer = repo
        .create_user(new_user("+1000", Role::Customer))
        .await
        .unwrap();
    let mut drivers = Vec::new();
    for n in 0..6 {
        let d = repo
            .create_user(new_user(&format!("+20{n}"), Role::TaxiDriver))
            .await
            .unwrap();
        drivers.push(d.id);
    }
    let order = repo
        .create_order(NewOrder::new(customer.id, "A".into(), "B".into()).unwrap())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for driver in drivers {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.transition(order.id, Transition::Accept { driver })
                .await
                .unwrap()
        }));
    }
    let mut applied = 0;
    let mut rejected = 0;
    for h in handles {
        match h.await.unwrap() {
            TransitionOutcome::Applied(_) => applied += 1,
            TransitionOutcome::Rejected(o) => {
                assert_eq!(o.status, OrderStatus::Accepted);
                rejected += 1;
            }
            TransitionOutcome::Missing => panic!("order vanished"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(rejected, 5);
}
