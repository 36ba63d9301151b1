use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::str::FromStr;
use taxi_types::domain::order::{
    NewOrder, Order, OrderId, OrderStatus, Transition, TransitionOutcome,
};
use taxi_types::domain::user::{Gender, NewUser, Role, User, UserId};
use taxi_types::ports::order_repository::{OrderRepository, Window};
use taxi_types::ports::user_repository::UserRepository;
use taxi_types::ports::RepoError;

const MIGRATIONS: [&str; 4] = [
    include_str!("../migrations/0001_create_users.sql"),
    include_str!("../migrations/0002_create_orders.sql"),
    include_str!("../migrations/0003_index_orders_status.sql"),
    include_str!("../migrations/0004_index_orders_customer.sql"),
];

const USER_COLUMNS: &str = "id, phone_number, role, full_name, gender, age, car_model, \
     password_hash, is_active, is_staff, created_at";
const ORDER_COLUMNS: &str =
    "id, customer_id, taxi_driver_id, location_from, location_to, order_time, status";

#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

fn db_err(e: impl ToString) -> RepoError {
    RepoError::DbError(e.to_string())
}

fn encode_time(t: DateTime<Utc>) -> String {
    // Fixed width so lexical order in SQL matches chronological order.
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(s: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

#[derive(FromRow)]
struct DbUser {
    id: i64,
    phone_number: String,
    role: String,
    full_name: Option<String>,
    gender: Option<String>,
    age: Option<i32>,
    car_model: Option<String>,
    password_hash: String,
    is_active: bool,
    is_staff: bool,
    created_at: String,
}

impl DbUser {
    fn into_user(self) -> Result<User, RepoError> {
        let role = Role::from_str(&self.role).map_err(RepoError::DbError)?;
        let gender = self
            .gender
            .as_deref()
            .map(Gender::from_str)
            .transpose()
            .map_err(RepoError::DbError)?;
        Ok(User {
            id: self.id,
            phone_number: self.phone_number,
            role,
            full_name: self.full_name,
            gender,
            age: self.age,
            car_model: self.car_model,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_staff: self.is_staff,
            created_at: decode_time(&self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbOrder {
    id: i64,
    customer_id: i64,
    taxi_driver_id: Option<i64>,
    location_from: String,
    location_to: String,
    order_time: String,
    status: i64,
}

impl DbOrder {
    fn into_order(self) -> Result<Order, RepoError> {
        let status = u8::try_from(self.status)
            .map_err(db_err)
            .and_then(|code| OrderStatus::try_from(code).map_err(RepoError::DbError))?;
        Ok(Order {
            id: self.id,
            customer: self.customer_id,
            location_from: self.location_from,
            location_to: self.location_to,
            order_time: decode_time(&self.order_time)?,
            status,
            taxi_driver: self.taxi_driver_id,
        })
    }
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        let in_memory = database_url.contains(":memory:");
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if !in_memory {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection is its own database.
        let max_connections = if in_memory { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        for ddl in MIGRATIONS {
            sqlx::query(ddl).execute(&pool).await?;
        }
        tracing::debug!(url = database_url, "sqlite repo ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl UserRepository for SqliteRepo {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let res = sqlx::query(
            "INSERT INTO users (phone_number, role, full_name, gender, age, car_model, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(user.gender.map(Gender::as_str))
        .bind(user.age)
        .bind(&user.car_model)
        .bind(&user.password_hash)
        .bind(encode_time(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(format!("phone_number {}", user.phone_number))
            }
            other => db_err(other),
        })?;

        self.get_user(res.last_insert_rowid())
            .await?
            .ok_or_else(|| RepoError::DbError("inserted user vanished".into()))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let row: Option<DbUser> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbUser::into_user).transpose()
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, RepoError> {
        let row: Option<DbUser> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?"
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DbUser::into_user).transpose()
    }
}

async fn fetch_order(
    conn: &mut SqliteConnection,
    id: OrderId,
) -> Result<Option<Order>, RepoError> {
    let row: Option<DbOrder> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
    row.map(DbOrder::into_order).transpose()
}

async fn transition_locked(
    conn: &mut SqliteConnection,
    id: OrderId,
    transition: Transition,
) -> Result<TransitionOutcome, RepoError> {
    let Some(mut order) = fetch_order(conn, id).await? else {
        return Ok(TransitionOutcome::Missing);
    };
    if order.apply(transition).is_err() {
        return Ok(TransitionOutcome::Rejected(order));
    }

    let updated = sqlx::query(
        "UPDATE orders SET status = ?, taxi_driver_id = ? WHERE id = ? AND status = ?",
    )
    .bind(i64::from(order.status.code()))
    .bind(order.taxi_driver)
    .bind(id)
    .bind(i64::from(OrderStatus::Waiting.code()))
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if updated.rows_affected() == 0 {
        return Ok(match fetch_order(conn, id).await? {
            Some(current) => TransitionOutcome::Rejected(current),
            None => TransitionOutcome::Missing,
        });
    }
    Ok(TransitionOutcome::Applied(order))
}

async fn transition_immediate(
    pool: SqlitePool,
    id: OrderId,
    transition: Transition,
) -> Result<TransitionOutcome, RepoError> {
    let mut conn = pool.acquire().await.map_err(db_err)?;
    // IMMEDIATE takes the write lock up front, so concurrent transitions
    // queue on the busy timeout instead of failing on lock upgrade.
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    let outcome = transition_locked(&mut conn, id, transition).await;
    let finish = match &outcome {
        Ok(TransitionOutcome::Applied(_)) => "COMMIT",
        _ => "ROLLBACK",
    };
    if let Err(e) = sqlx::query(finish).execute(&mut *conn).await {
        // The connection goes back to the pool; it must not stay in a transaction.
        let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        return Err(db_err(e));
    }
    outcome
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepoError> {
        let res = sqlx::query(
            "INSERT INTO orders (customer_id, taxi_driver_id, location_from, location_to, order_time, status)
             VALUES (?, NULL, ?, ?, ?, ?)",
        )
        .bind(order.customer)
        .bind(&order.location_from)
        .bind(&order.location_to)
        .bind(encode_time(order.order_time))
        .bind(i64::from(OrderStatus::Waiting.code()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_order(res.last_insert_rowid())
            .await?
            .ok_or_else(|| RepoError::DbError("inserted order vanished".into()))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        fetch_order(&mut conn, id).await
    }

    async fn list_by_customer(&self, customer: UserId) -> Result<Vec<Order>, RepoError> {
        let rows: Vec<DbOrder> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?
             ORDER BY order_time DESC, id DESC"
        ))
        .bind(customer)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(DbOrder::into_order)
            .collect::<Result<Vec<_>, _>>()
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        window: Option<Window>,
    ) -> Result<Vec<Order>, RepoError> {
        // A negative LIMIT means no limit in SQLite.
        let (limit, offset) = match window {
            Some(w) => (
                i64::try_from(w.limit).map_err(db_err)?,
                i64::try_from(w.offset).map_err(db_err)?,
            ),
            None => (-1, 0),
        };
        let rows: Vec<DbOrder> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = ?
             ORDER BY order_time DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(status.code()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(DbOrder::into_order)
            .collect::<Result<Vec<_>, _>>()
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64, RepoError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = ?")
            .bind(i64::from(status.code()))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        u64::try_from(count).map_err(db_err)
    }

    async fn transition(
        &self,
        id: OrderId,
        transition: Transition,
    ) -> Result<TransitionOutcome, RepoError> {
        // Detached so the transaction always reaches COMMIT or ROLLBACK,
        // even when the calling request is dropped.
        let pool = self.pool.clone();
        tokio::spawn(transition_immediate(pool, id, transition))
            .await
            .map_err(db_err)?
    }
}
