use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::new_id,
    models::{
        BranchStockRow, MasterProductRow, PurchaseOrderDetailRow, PurchaseOrderRow, StockTransferRow,
        SupplierRow, PO_CANCELLED, PO_DRAFT, PO_ORDERED, PO_RECEIVED, TRANSFER_CANCELLED,
        TRANSFER_COMPLETED, TRANSFER_PENDING,
    },
};

pub struct NewSupplier {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

pub struct NewProduct {
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub description: Option<String>,
    pub supplier_id: Option<String>,
}

pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost: f64,
}

// ---- suppliers ----

pub async fn create_supplier(
    pool: &SqlitePool,
    input: NewSupplier,
) -> Result<SupplierRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO suppliers (id, name, contact_person, phone, email, address, active, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.name)
    .bind(&input.contact_person)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(&input.address)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, SupplierRow>("SELECT * FROM suppliers WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

pub async fn update_supplier(
    pool: &SqlitePool,
    id: &str,
    input: NewSupplier,
) -> Result<Option<SupplierRow>, sqlx::Error> {
    sqlx::query(
        r#"UPDATE suppliers SET name = ?, contact_person = ?, phone = ?, email = ?, address = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&input.name)
    .bind(&input.contact_person)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(&input.address)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, SupplierRow>("SELECT * FROM suppliers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn suppliers(pool: &SqlitePool) -> Result<Vec<SupplierRow>, sqlx::Error> {
    sqlx::query_as::<_, SupplierRow>("SELECT * FROM suppliers WHERE active = 1 ORDER BY name")
        .fetch_all(pool)
        .await
}

// ---- products ----

pub async fn create_master_product(
    pool: &SqlitePool,
    input: NewProduct,
) -> Result<MasterProductRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO master_products (id, name, category, unit, description, supplier_id, active, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.name)
    .bind(&input.category)
    .bind(&input.unit)
    .bind(&input.description)
    .bind(&input.supplier_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, MasterProductRow>("SELECT * FROM master_products WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

pub async fn master_products(pool: &SqlitePool) -> Result<Vec<MasterProductRow>, sqlx::Error> {
    sqlx::query_as::<_, MasterProductRow>(
        "SELECT * FROM master_products WHERE active = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

/// Makes a master product stockable at a branch, with branch pricing and a
/// reorder threshold.
pub async fn link_branch_product(
    pool: &SqlitePool,
    branch_id: &str,
    product_id: &str,
    retail_price: f64,
    reorder_level: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO branch_products (id, branch_id, product_id, retail_price, reorder_level)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(branch_id, product_id) DO UPDATE SET
             retail_price = excluded.retail_price,
             reorder_level = excluded.reorder_level"#,
    )
    .bind(new_id())
    .bind(branch_id)
    .bind(product_id)
    .bind(retail_price)
    .bind(reorder_level)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn branch_products(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<BranchStockRow>, sqlx::Error> {
    sqlx::query_as::<_, BranchStockRow>(
        r#"SELECT bp.product_id, mp.name AS product_name, mp.unit, mp.category,
                  bp.retail_price, bp.reorder_level,
                  COALESCE(s.quantity, 0) AS quantity
           FROM branch_products bp
           JOIN master_products mp ON mp.id = bp.product_id
           LEFT JOIN stocks s ON s.branch_id = bp.branch_id AND s.product_id = bp.product_id
           WHERE bp.branch_id = ?
           ORDER BY mp.name"#,
    )
    .bind(branch_id)
    .fetch_all(pool)
    .await
}

pub async fn low_stock(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<BranchStockRow>, sqlx::Error> {
    let rows = branch_products(pool, branch_id).await?;
    Ok(rows
        .into_iter()
        .filter(|row| row.quantity <= row.reorder_level)
        .collect())
}

// ---- stock ----

async fn apply_stock_delta(
    conn: &mut SqliteConnection,
    branch_id: &str,
    product_id: &str,
    delta: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO stocks (id, branch_id, product_id, quantity, updated_at)
           VALUES (?, ?, ?, MAX(0, ?), ?)
           ON CONFLICT(branch_id, product_id) DO UPDATE SET
             quantity = MAX(0, stocks.quantity + ?),
             updated_at = excluded.updated_at"#,
    )
    .bind(new_id())
    .bind(branch_id)
    .bind(product_id)
    .bind(delta)
    .bind(Utc::now().to_rfc3339())
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn stock_level(
    pool: &SqlitePool,
    branch_id: &str,
    product_id: &str,
) -> Result<i64, sqlx::Error> {
    let quantity = sqlx::query_scalar::<_, i64>(
        "SELECT quantity FROM stocks WHERE branch_id = ? AND product_id = ?",
    )
    .bind(branch_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(quantity.unwrap_or(0))
}

/// Manual adjustment, clamped at zero.
pub async fn adjust_stock(
    pool: &SqlitePool,
    branch_id: &str,
    product_id: &str,
    delta: i64,
) -> Result<i64, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    apply_stock_delta(&mut conn, branch_id, product_id, delta).await?;
    drop(conn);
    stock_level(pool, branch_id, product_id).await
}

/// Consumption by the salon itself (backbar use): a usage record plus the
/// matching stock decrement, in one transaction.
pub async fn record_salon_use(
    pool: &SqlitePool,
    branch_id: &str,
    product_id: &str,
    quantity: i64,
    used_by: &str,
    notes: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO salon_use_products (id, branch_id, product_id, quantity, used_by, notes, used_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(branch_id)
    .bind(product_id)
    .bind(quantity)
    .bind(used_by)
    .bind(notes)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    apply_stock_delta(&mut tx, branch_id, product_id, -quantity).await?;

    tx.commit().await
}

// ---- purchase orders ----

pub async fn create_purchase_order(
    pool: &SqlitePool,
    branch_id: &str,
    supplier_id: &str,
    created_by: &str,
    lines: Vec<OrderLine>,
) -> Result<PurchaseOrderRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO purchase_orders (id, branch_id, supplier_id, status, created_by, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(branch_id)
    .bind(supplier_id)
    .bind(PO_DRAFT)
    .bind(created_by)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for line in &lines {
        sqlx::query(
            r#"INSERT INTO purchase_order_details (id, order_id, product_id, quantity, unit_cost)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(&id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    purchase_order_by_id(pool, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn purchase_order_by_id(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<PurchaseOrderRow>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseOrderRow>(
        r#"SELECT po.*, s.name AS supplier_name
           FROM purchase_orders po
           LEFT JOIN suppliers s ON s.id = po.supplier_id
           WHERE po.id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn purchase_orders_by_branch(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<PurchaseOrderRow>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseOrderRow>(
        r#"SELECT po.*, s.name AS supplier_name
           FROM purchase_orders po
           LEFT JOIN suppliers s ON s.id = po.supplier_id
           WHERE po.branch_id = ?
           ORDER BY po.created_at DESC"#,
    )
    .bind(branch_id)
    .fetch_all(pool)
    .await
}

pub async fn order_details(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<PurchaseOrderDetailRow>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseOrderDetailRow>(
        r#"SELECT d.*, mp.name AS product_name
           FROM purchase_order_details d
           LEFT JOIN master_products mp ON mp.id = d.product_id
           WHERE d.order_id = ?"#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}

pub async fn add_order_line(
    pool: &SqlitePool,
    order_id: &str,
    line: OrderLine,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO purchase_order_details (id, order_id, product_id, quantity, unit_cost)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(order_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_cost)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_ordered(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<PurchaseOrderRow>, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE purchase_orders SET status = ?, ordered_at = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(PO_ORDERED)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .bind(PO_DRAFT)
    .execute(pool)
    .await?;

    purchase_order_by_id(pool, id).await
}

/// Marks the order received and books each detail line into stock. The
/// status guard makes the stock increment happen at most once per order.
pub async fn receive_purchase_order(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<PurchaseOrderRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, (String, String)>(
        "SELECT branch_id, status FROM purchase_orders WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((branch_id, status)) = order else {
        return Ok(None);
    };
    if status != PO_DRAFT && status != PO_ORDERED {
        tx.rollback().await?;
        return purchase_order_by_id(pool, id).await;
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE purchase_orders SET status = ?, received_at = ?, updated_at = ? WHERE id = ?")
        .bind(PO_RECEIVED)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let lines = sqlx::query_as::<_, (String, i64)>(
        "SELECT product_id, quantity FROM purchase_order_details WHERE order_id = ?",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    for (product_id, quantity) in lines {
        apply_stock_delta(&mut tx, &branch_id, &product_id, quantity).await?;
    }

    tx.commit().await?;
    purchase_order_by_id(pool, id).await
}

pub async fn cancel_purchase_order(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<PurchaseOrderRow>, sqlx::Error> {
    sqlx::query(
        "UPDATE purchase_orders SET status = ?, updated_at = ? WHERE id = ? AND status != ?",
    )
    .bind(PO_CANCELLED)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .bind(PO_RECEIVED)
    .execute(pool)
    .await?;

    purchase_order_by_id(pool, id).await
}

// ---- transfers ----

pub async fn request_transfer(
    pool: &SqlitePool,
    from_branch_id: &str,
    to_branch_id: &str,
    product_id: &str,
    quantity: i64,
    requested_by: &str,
) -> Result<StockTransferRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO stock_transfers (id, from_branch_id, to_branch_id, product_id, quantity, status, requested_by, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(from_branch_id)
    .bind(to_branch_id)
    .bind(product_id)
    .bind(quantity)
    .bind(TRANSFER_PENDING)
    .bind(requested_by)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, StockTransferRow>("SELECT * FROM stock_transfers WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

/// Moves the quantity between branches atomically. Fails without touching
/// stock when the source branch cannot cover the transfer.
pub async fn complete_transfer(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<StockTransferRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let transfer = sqlx::query_as::<_, StockTransferRow>(
        "SELECT * FROM stock_transfers WHERE id = ? LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(transfer) = transfer else {
        return Ok(None);
    };
    if transfer.status != TRANSFER_PENDING {
        tx.rollback().await?;
        return Ok(Some(transfer));
    }

    let available = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE((SELECT quantity FROM stocks WHERE branch_id = ? AND product_id = ?), 0)",
    )
    .bind(&transfer.from_branch_id)
    .bind(&transfer.product_id)
    .fetch_one(&mut *tx)
    .await?;

    if available < transfer.quantity {
        tx.rollback().await?;
        return Err(sqlx::Error::Protocol(format!(
            "insufficient stock for transfer {id}: have {available}, need {}",
            transfer.quantity
        )));
    }

    apply_stock_delta(&mut tx, &transfer.from_branch_id, &transfer.product_id, -transfer.quantity)
        .await?;
    apply_stock_delta(&mut tx, &transfer.to_branch_id, &transfer.product_id, transfer.quantity)
        .await?;

    sqlx::query("UPDATE stock_transfers SET status = ?, updated_at = ? WHERE id = ?")
        .bind(TRANSFER_COMPLETED)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    sqlx::query_as::<_, StockTransferRow>("SELECT * FROM stock_transfers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn cancel_transfer(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<StockTransferRow>, sqlx::Error> {
    sqlx::query(
        "UPDATE stock_transfers SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(TRANSFER_CANCELLED)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .bind(TRANSFER_PENDING)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, StockTransferRow>("SELECT * FROM stock_transfers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn transfers_for_branch(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<StockTransferRow>, sqlx::Error> {
    sqlx::query_as::<_, StockTransferRow>(
        r#"SELECT * FROM stock_transfers
           WHERE from_branch_id = ? OR to_branch_id = ?
           ORDER BY created_at DESC"#,
    )
    .bind(branch_id)
    .bind(branch_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    async fn product(pool: &SqlitePool, name: &str) -> MasterProductRow {
        create_master_product(
            pool,
            NewProduct {
                name: name.to_string(),
                category: Some("Color".to_string()),
                unit: "bottle".to_string(),
                description: None,
                supplier_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn supplier_updates_replace_contact_fields() {
        let pool = testing::pool().await;
        let supplier = create_supplier(
            &pool,
            NewSupplier {
                name: "BeautySupply Co".to_string(),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
            },
        )
        .await
        .unwrap();

        let updated = update_supplier(
            &pool,
            &supplier.id,
            NewSupplier {
                name: "BeautySupply Intl".to_string(),
                contact_person: Some("Mia Tan".to_string()),
                phone: Some("+1 555 0400".to_string()),
                email: None,
                address: None,
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "BeautySupply Intl");
        assert_eq!(updated.contact_person.as_deref(), Some("Mia Tan"));
    }

    #[tokio::test]
    async fn adjustments_clamp_at_zero() {
        let pool = testing::pool().await;
        let p = product(&pool, "Developer 20vol").await;

        assert_eq!(adjust_stock(&pool, "b1", &p.id, 10).await.unwrap(), 10);
        assert_eq!(adjust_stock(&pool, "b1", &p.id, -4).await.unwrap(), 6);
        assert_eq!(adjust_stock(&pool, "b1", &p.id, -100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn receiving_an_order_increments_stock_exactly_once() {
        let pool = testing::pool().await;
        let p = product(&pool, "Developer 20vol").await;
        let supplier = create_supplier(
            &pool,
            NewSupplier {
                name: "BeautySupply Co".to_string(),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
            },
        )
        .await
        .unwrap();

        let order = create_purchase_order(
            &pool,
            "b1",
            &supplier.id,
            "user-1",
            vec![OrderLine {
                product_id: p.id.clone(),
                quantity: 12,
                unit_cost: 4.5,
            }],
        )
        .await
        .unwrap();
        assert_eq!(order.status, PO_DRAFT);

        let order = mark_ordered(&pool, &order.id).await.unwrap().unwrap();
        assert_eq!(order.status, PO_ORDERED);

        let order = receive_purchase_order(&pool, &order.id).await.unwrap().unwrap();
        assert_eq!(order.status, PO_RECEIVED);
        assert!(order.received_at.is_some());
        assert_eq!(stock_level(&pool, "b1", &p.id).await.unwrap(), 12);

        // A second receive is a no-op.
        receive_purchase_order(&pool, &order.id).await.unwrap();
        assert_eq!(stock_level(&pool, "b1", &p.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn transfer_moves_stock_atomically() {
        let pool = testing::pool().await;
        let p = product(&pool, "Argan Oil").await;
        adjust_stock(&pool, "b1", &p.id, 8).await.unwrap();

        let transfer = request_transfer(&pool, "b1", "b2", &p.id, 5, "user-1")
            .await
            .unwrap();
        let transfer = complete_transfer(&pool, &transfer.id).await.unwrap().unwrap();
        assert_eq!(transfer.status, TRANSFER_COMPLETED);
        assert_eq!(stock_level(&pool, "b1", &p.id).await.unwrap(), 3);
        assert_eq!(stock_level(&pool, "b2", &p.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn transfer_fails_without_sufficient_source_stock() {
        let pool = testing::pool().await;
        let p = product(&pool, "Argan Oil").await;
        adjust_stock(&pool, "b1", &p.id, 2).await.unwrap();

        let transfer = request_transfer(&pool, "b1", "b2", &p.id, 5, "user-1")
            .await
            .unwrap();
        assert!(complete_transfer(&pool, &transfer.id).await.is_err());

        // Nothing moved.
        assert_eq!(stock_level(&pool, "b1", &p.id).await.unwrap(), 2);
        assert_eq!(stock_level(&pool, "b2", &p.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn salon_use_logs_and_decrements() {
        let pool = testing::pool().await;
        let p = product(&pool, "Shampoo Backbar").await;
        adjust_stock(&pool, "b1", &p.id, 10).await.unwrap();

        record_salon_use(&pool, "b1", &p.id, 3, "sty-1", Some("color day"))
            .await
            .unwrap();
        assert_eq!(stock_level(&pool, "b1", &p.id).await.unwrap(), 7);

        let used = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM salon_use_products")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(used, 1);
    }

    #[tokio::test]
    async fn low_stock_respects_reorder_level() {
        let pool = testing::pool().await;
        let p1 = product(&pool, "Developer 20vol").await;
        let p2 = product(&pool, "Argan Oil").await;
        link_branch_product(&pool, "b1", &p1.id, 8.0, 5).await.unwrap();
        link_branch_product(&pool, "b1", &p2.id, 15.0, 2).await.unwrap();
        adjust_stock(&pool, "b1", &p1.id, 4).await.unwrap();
        adjust_stock(&pool, "b1", &p2.id, 9).await.unwrap();

        let low = low_stock(&pool, "b1").await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, p1.id);
    }
}
