use taxi_repo::{build_repo, Repo};
use taxi_types::domain::order::{NewOrder, OrderStatus};
use taxi_types::domain::user::{NewUser, Role};
use taxi_types::ports::order_repository::OrderRepository;
use taxi_types::ports::user_repository::UserRepository;

#[tokio::test]
async fn builds_repo_from_url() {
    // Use a temp DB path for isolation.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("taxi-test.db");
    let url = format!("sqlite://{}", db_path.display());

    let repo: Repo = build_repo(Some(&url)).await.expect("build repo");
    // basic sanity: listing should succeed and be empty
    let waiting = repo
        .list_by_status(OrderStatus::Waiting, None)
        .await
        .expect("list");
    assert!(waiting.is_empty());

    let user = repo
        .create_user(
            NewUser::new("+1000".into(), Role::Customer, None, None, None, None, "h".into())
                .unwrap(),
        )
        .await
        .unwrap();
    let order = repo
        .create_order(NewOrder::new(user.id, "A".into(), "B".into()).unwrap())
        .await
        .unwrap();
    assert_eq!(repo.list_by_customer(user.id).await.unwrap(), vec![order]);
}
