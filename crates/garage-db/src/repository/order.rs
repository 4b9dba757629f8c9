//! Customer parts orders (sales over the counter) and supplier orders
//! (deliveries into stock).

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::catalog::CatalogRepository;
use super::{soft_delete, MetaRow};
use crate::error::{DbError, DbResult};
use garage_core::order::{CustomerPartsOrder, SellLine, Supplier, SupplierOrder, SupplierOrderLine};

#[derive(Debug, sqlx::FromRow)]
struct PartsOrderRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    customer_id: String,
    order_date: NaiveDate,
}

#[derive(Debug, sqlx::FromRow)]
struct SellLineRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    part_id: String,
    quantity: i64,
    sufficient_quantity: bool,
}

impl From<SellLineRow> for SellLine {
    fn from(row: SellLineRow) -> Self {
        SellLine {
            meta: row.meta.into(),
            part_id: row.part_id,
            quantity: row.quantity,
            sufficient_quantity: row.sufficient_quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    company_name: String,
    address: String,
    postcode: String,
    phone_number: String,
    email: String,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            meta: row.meta.into(),
            company_name: row.company_name,
            address: row.address,
            postcode: row.postcode,
            phone_number: row.phone_number,
            email: row.email,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SupplierOrderRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    supplier_id: String,
    order_date: NaiveDate,
}

#[derive(Debug, sqlx::FromRow)]
struct SupplierLineRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    part_id: String,
    quantity: i64,
}

impl From<SupplierLineRow> for SupplierOrderLine {
    fn from(row: SupplierLineRow) -> Self {
        SupplierOrderLine {
            meta: row.meta.into(),
            part_id: row.part_id,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Customer Parts Orders
    // =========================================================================

    /// Records a sale. Lines that stock covers take their parts off the
    /// shelf; the rest are stored with `sufficient_quantity = false`.
    pub async fn insert_parts_order(&self, order: &mut CustomerPartsOrder) -> DbResult<()> {
        debug!(id = %order.meta.id, lines = order.lines.len(), "Inserting parts order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO parts_orders (
                id, customer_id, order_date,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order.meta.id)
        .bind(&order.customer_id)
        .bind(order.order_date)
        .bind(order.meta.created_at)
        .bind(order.meta.updated_at)
        .bind(order.meta.deleted_at)
        .bind(order.meta.version)
        .execute(&mut *tx)
        .await?;

        for line in &mut order.lines {
            let part = CatalogRepository::fetch_part(&mut tx, &line.part_id).await?;
            line.sufficient_quantity = part.quantity >= line.quantity;
            if line.sufficient_quantity {
                CatalogRepository::consume_stock(&mut tx, &line.part_id, line.quantity).await?;
            } else {
                warn!(code = %part.code, available = part.quantity, requested = line.quantity, "Insufficient stock for sale");
            }

            sqlx::query(
                r#"
                INSERT INTO sell_lines (
                    id, order_id, part_id, quantity, sufficient_quantity,
                    created_at, updated_at, deleted_at, version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&line.meta.id)
            .bind(&order.meta.id)
            .bind(&line.part_id)
            .bind(line.quantity)
            .bind(line.sufficient_quantity)
            .bind(line.meta.created_at)
            .bind(line.meta.updated_at)
            .bind(line.meta.deleted_at)
            .bind(line.meta.version)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Loads a live parts order with its lines.
    pub(crate) async fn fetch_parts_order(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<CustomerPartsOrder> {
        let row: Option<PartsOrderRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, order_date, created_at, updated_at, deleted_at, version
            FROM parts_orders WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        let row = row.ok_or_else(|| DbError::not_found("CustomerPartsOrder", id))?;
        parts_order_with_lines(conn, row).await
    }

    pub async fn get_parts_order(&self, id: &str) -> DbResult<CustomerPartsOrder> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_parts_order(&mut conn, id).await
    }

    /// Live parts orders dated on or after `since`.
    pub(crate) async fn parts_orders_since(
        conn: &mut SqliteConnection,
        since: NaiveDate,
    ) -> DbResult<Vec<CustomerPartsOrder>> {
        let rows: Vec<PartsOrderRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, order_date, created_at, updated_at, deleted_at, version
            FROM parts_orders
            WHERE deleted_at IS NULL AND order_date >= ?1
            ORDER BY order_date
            "#,
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(parts_order_with_lines(conn, row).await?);
        }
        Ok(orders)
    }

    pub async fn delete_parts_order(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        soft_delete(&mut conn, "parts_orders", "CustomerPartsOrder", id).await
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    pub async fn insert_supplier(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.meta.id, name = %supplier.company_name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, company_name, address, postcode, phone_number, email,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&supplier.meta.id)
        .bind(&supplier.company_name)
        .bind(&supplier.address)
        .bind(&supplier.postcode)
        .bind(&supplier.phone_number)
        .bind(&supplier.email)
        .bind(supplier.meta.created_at)
        .bind(supplier.meta.updated_at)
        .bind(supplier.meta.deleted_at)
        .bind(supplier.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Supplier> {
        let row: Option<SupplierRow> = sqlx::query_as(
            r#"
            SELECT id, company_name, address, postcode, phone_number, email,
                   created_at, updated_at, deleted_at, version
            FROM suppliers WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Supplier::from)
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    // =========================================================================
    // Supplier Orders
    // =========================================================================

    /// Records a delivery and restocks every line, atomically.
    pub async fn insert_supplier_order(&self, order: &SupplierOrder) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO supplier_orders (
                id, supplier_id, order_date,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order.meta.id)
        .bind(&order.supplier_id)
        .bind(order.order_date)
        .bind(order.meta.created_at)
        .bind(order.meta.updated_at)
        .bind(order.meta.deleted_at)
        .bind(order.meta.version)
        .execute(&mut *tx)
        .await?;

        for line in order.live_lines() {
            CatalogRepository::restock(&mut tx, &line.part_id, line.quantity).await?;

            sqlx::query(
                r#"
                INSERT INTO supplier_order_lines (
                    id, order_id, part_id, quantity,
                    created_at, updated_at, deleted_at, version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.meta.id)
            .bind(&order.meta.id)
            .bind(&line.part_id)
            .bind(line.quantity)
            .bind(line.meta.created_at)
            .bind(line.meta.updated_at)
            .bind(line.meta.deleted_at)
            .bind(line.meta.version)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(id = %order.meta.id, supplier = %order.supplier_id, lines = order.lines.len(), "Supplier delivery booked in");
        Ok(())
    }

    pub async fn get_supplier_order(&self, id: &str) -> DbResult<SupplierOrder> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<SupplierOrderRow> = sqlx::query_as(
            r#"
            SELECT id, supplier_id, order_date, created_at, updated_at, deleted_at, version
            FROM supplier_orders WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        let row = row.ok_or_else(|| DbError::not_found("SupplierOrder", id))?;
        supplier_order_with_lines(&mut conn, row).await
    }

    /// Live supplier orders dated on or after `since`.
    pub(crate) async fn supplier_orders_since(
        conn: &mut SqliteConnection,
        since: NaiveDate,
    ) -> DbResult<Vec<SupplierOrder>> {
        let rows: Vec<SupplierOrderRow> = sqlx::query_as(
            r#"
            SELECT id, supplier_id, order_date, created_at, updated_at, deleted_at, version
            FROM supplier_orders
            WHERE deleted_at IS NULL AND order_date >= ?1
            ORDER BY order_date
            "#,
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(supplier_order_with_lines(conn, row).await?);
        }
        Ok(orders)
    }
}

async fn parts_order_with_lines(
    conn: &mut SqliteConnection,
    row: PartsOrderRow,
) -> DbResult<CustomerPartsOrder> {
    let lines: Vec<SellLineRow> = sqlx::query_as(
        r#"
        SELECT id, part_id, quantity, sufficient_quantity,
               created_at, updated_at, deleted_at, version
        FROM sell_lines WHERE order_id = ?1 ORDER BY created_at
        "#,
    )
    .bind(&row.meta.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(CustomerPartsOrder {
        meta: row.meta.into(),
        customer_id: row.customer_id,
        order_date: row.order_date,
        lines: lines.into_iter().map(SellLine::from).collect(),
    })
}

async fn supplier_order_with_lines(
    conn: &mut SqliteConnection,
    row: SupplierOrderRow,
) -> DbResult<SupplierOrder> {
    let lines: Vec<SupplierLineRow> = sqlx::query_as(
        r#"
        SELECT id, part_id, quantity, created_at, updated_at, deleted_at, version
        FROM supplier_order_lines WHERE order_id = ?1 ORDER BY created_at
        "#,
    )
    .bind(&row.meta.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(SupplierOrder {
        meta: row.meta.into(),
        supplier_id: row.supplier_id,
        order_date: row.order_date,
        lines: lines.into_iter().map(SupplierOrderLine::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use garage_core::catalog::Part;
    use garage_core::customer::{Contact, Customer};
    use garage_core::Money;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    #[tokio::test]
    async fn test_sale_takes_stock_when_covered() {
        let db = db().await;
        let customer = Customer::dropin(Contact::new("Sam", "Lee"));
        db.customers().insert(&customer).await.unwrap();
        let part = Part::new("WPR-2", "Wiper blade", Money::from_pence(899), 5, 1).unwrap();
        db.catalog().insert_part(&part).await.unwrap();

        let mut order = CustomerPartsOrder::new(&customer.meta.id, day(2));
        order.lines.push(SellLine::new(&part.meta.id, 2).unwrap());
        order.lines.push(SellLine::new(&part.meta.id, 9).unwrap());
        db.orders().insert_parts_order(&mut order).await.unwrap();

        assert!(order.lines[0].sufficient_quantity);
        assert!(!order.lines[1].sufficient_quantity);
        assert_eq!(db.catalog().get_part(&part.meta.id).await.unwrap().quantity, 3);

        let loaded = db.orders().get_parts_order(&order.meta.id).await.unwrap();
        assert_eq!(loaded.lines.len(), 2);

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(OrderRepository::parts_orders_since(&mut conn, day(1)).await.unwrap().len(), 1);
        assert!(OrderRepository::parts_orders_since(&mut conn, day(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_parts_order_is_not_found() {
        let db = db().await;
        let customer = Customer::dropin(Contact::new("Sam", "Lee"));
        db.customers().insert(&customer).await.unwrap();

        let mut order = CustomerPartsOrder::new(&customer.meta.id, day(2));
        db.orders().insert_parts_order(&mut order).await.unwrap();
        db.orders().delete_parts_order(&order.meta.id).await.unwrap();

        assert!(db.orders().get_parts_order(&order.meta.id).await.unwrap_err().is_not_found());
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(OrderRepository::parts_orders_since(&mut conn, day(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_restocks() {
        let db = db().await;
        let part = Part::new("WPR-2", "Wiper blade", Money::from_pence(899), 0, 1).unwrap();
        db.catalog().insert_part(&part).await.unwrap();
        let supplier = Supplier::new("Parts Direct", "01132000000").unwrap();
        db.orders().insert_supplier(&supplier).await.unwrap();

        let mut order = SupplierOrder::new(&supplier.meta.id, day(5));
        order.lines.push(SupplierOrderLine::new(&part.meta.id, 12).unwrap());
        db.orders().insert_supplier_order(&order).await.unwrap();

        assert_eq!(db.catalog().get_part(&part.meta.id).await.unwrap().quantity, 12);
        let loaded = db.orders().get_supplier_order(&order.meta.id).await.unwrap();
        assert_eq!(loaded.lines[0].quantity, 12);
        assert_eq!(db.orders().get_supplier(&supplier.meta.id).await.unwrap().company_name, "Parts Direct");
    }

    #[tokio::test]
    async fn test_delivery_of_unknown_part_rolls_back() {
        let db = db().await;
        let supplier = Supplier::new("Parts Direct", "01132000000").unwrap();
        db.orders().insert_supplier(&supplier).await.unwrap();

        let mut order = SupplierOrder::new(&supplier.meta.id, day(5));
        order.lines.push(SupplierOrderLine::new("missing", 1).unwrap());
        assert!(db.orders().insert_supplier_order(&order).await.unwrap_err().is_not_found());
        assert!(db.orders().get_supplier_order(&order.meta.id).await.unwrap_err().is_not_found());
    }
}
