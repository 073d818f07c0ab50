//! End-to-end checkout against PostgreSQL, covering the row-lock
//! serialization the in-memory store only approximates.
//!
//! ```bash
//! cargo test -p checkout --test postgres_checkout
//! ```

use std::sync::Arc;

use cart::Cart;
use checkout::{CheckoutCoordinator, CheckoutError};
use common::{Money, ProductId, UserId};
use store::{OrderStatus, PostgresStorefront, Storefront};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStorefront {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    let store = PostgresStorefront::new(pool);
    store.run_migrations().await.unwrap();
    store
}

async fn seed_product(
    store: &PostgresStorefront,
    name: &str,
    price: Money,
    stock: i32,
) -> ProductId {
    let id = ProductId::new();
    sqlx::query("INSERT INTO products (id, name, category, price_cents, stock) VALUES ($1, $2, 'general', $3, $4)")
        .bind(id.as_uuid())
        .bind(name)
        .bind(price.cents())
        .bind(stock)
        .execute(store.pool())
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn successful_checkout_end_to_end() {
    let store = get_test_store().await;
    let coordinator = CheckoutCoordinator::new(store.clone());

    let widget = seed_product(&store, "Widget", Money::from_cents(1000), 3).await;
    let gadget = seed_product(&store, "Gadget", Money::from_cents(2500), 1).await;
    let user_id = UserId::new();

    let mut cart = Cart::new();
    cart.add(widget, "Widget", Money::from_cents(1000));
    cart.add(gadget, "Gadget", Money::from_cents(2500));

    let order_id = coordinator
        .submit_checkout(user_id, &mut cart, "card", "123 Main St")
        .await
        .unwrap();

    assert!(cart.is_empty());

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total.cents(), 3500);

    let lines = store.order_lines(order_id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].product_id, widget);
    assert_eq!(lines[1].product_id, gadget);

    assert_eq!(store.get_product(widget).await.unwrap().unwrap().stock, 2);
    assert_eq!(store.get_product(gadget).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
async fn price_drift_mid_cart_leaves_no_residue() {
    let store = get_test_store().await;
    let coordinator = CheckoutCoordinator::new(store.clone());

    let widget = seed_product(&store, "Widget", Money::from_cents(1000), 3).await;
    let gadget = seed_product(&store, "Gadget", Money::from_cents(2500), 2).await;

    let mut cart = Cart::new();
    cart.add(widget, "Widget", Money::from_cents(1000));
    cart.add(gadget, "Gadget", Money::from_cents(2500));

    // Authoritative price moves two cents after the snapshot was taken.
    sqlx::query("UPDATE products SET price_cents = 2502 WHERE id = $1")
        .bind(gadget.as_uuid())
        .execute(store.pool())
        .await
        .unwrap();

    let result = coordinator
        .submit_checkout(UserId::new(), &mut cart, "card", "123 Main St")
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::PriceChanged { product_id, .. }) if product_id == gadget
    ));

    // The widget decrement from earlier in the attempt was rolled back.
    assert_eq!(store.get_product(widget).await.unwrap().unwrap().stock, 3);
    assert_eq!(store.get_product(gadget).await.unwrap().unwrap().stock, 2);

    let orders: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM order_details WHERE product_id IN ($1, $2)",
    )
    .bind(widget.as_uuid())
    .bind(gadget.as_uuid())
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test]
async fn two_checkouts_race_for_the_last_unit() {
    let store = get_test_store().await;
    let coordinator = Arc::new(CheckoutCoordinator::new(store.clone()));

    let last_one = seed_product(&store, "Last One", Money::from_cents(1000), 1).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let coordinator = coordinator.clone();
        let mut cart = Cart::new();
        cart.add(last_one, "Last One", Money::from_cents(1000));
        handles.push(tokio::spawn(async move {
            coordinator
                .submit_checkout(UserId::new(), &mut cart, "cash", "123 Main St")
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CheckoutError::OutOfStock(id) | CheckoutError::ConcurrentStockChange(id)) => {
                assert_eq!(id, last_one);
            }
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.get_product(last_one).await.unwrap().unwrap().stock, 0);
}
