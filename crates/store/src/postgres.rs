//! PostgreSQL-backed store.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{
    Money, OrderId, PaymentMethod, PaymentStatus, ProductId, ShipmentId, ShipmentStatus, UserId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::records::{
    CartLine, CouponRecord, OrderDraft, OrderItemRecord, OrderRecord, OutboxEntry, OutboxKind,
    ProductRecord, ShipmentRecord, ShippingInfo, TrackingEventRecord,
};
use crate::store::Store;

/// PostgreSQL store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_paise(row.try_get("price_paise")?),
            discounted_price: row
                .try_get::<Option<i64>, _>("discounted_price_paise")?
                .map(Money::from_paise),
            stock_quantity: row.try_get("stock_quantity")?,
        })
    }

    fn row_to_coupon(row: PgRow) -> Result<CouponRecord> {
        Ok(CouponRecord {
            id: row.try_get::<Uuid, _>("id")?.into(),
            code: row.try_get("code")?,
            valid_from: row.try_get("valid_from")?,
            valid_to: row.try_get("valid_to")?,
            discount_percent: row.try_get::<i16, _>("discount_percent")? as u8,
            active: row.try_get("active")?,
            max_uses: row.try_get::<i32, _>("max_uses")? as u32,
            used_count: row.try_get::<i32, _>("used_count")? as u32,
            min_order_amount: Money::from_paise(row.try_get("min_order_amount_paise")?),
        })
    }

    fn row_to_order(row: PgRow, items: Vec<OrderItemRecord>) -> Result<OrderRecord> {
        let payment_method: String = row.try_get("payment_method")?;
        let payment_status: String = row.try_get("payment_status")?;
        let shipping: serde_json::Value = row.try_get("shipping")?;
        let shipping: ShippingInfo = serde_json::from_value(shipping)?;

        Ok(OrderRecord {
            id: row.try_get::<Uuid, _>("id")?.into(),
            user_id: row.try_get::<Uuid, _>("user_id")?.into(),
            shipping,
            items,
            subtotal: Money::from_paise(row.try_get("subtotal_paise")?),
            coupon_id: row.try_get::<Option<Uuid>, _>("coupon_id")?.map(Into::into),
            discount_percent: row.try_get::<i16, _>("discount_percent")? as u8,
            total: Money::from_paise(row.try_get("total_paise")?),
            payment_method: PaymentMethod::parse(&payment_method),
            payment_status: PaymentStatus::parse(&payment_status)
                .ok_or(StoreError::InvalidStatus(payment_status))?,
            paid: row.try_get("paid")?,
            transaction_id: row.try_get("transaction_id")?,
            provider_payment_id: row.try_get("provider_payment_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_shipment(row: PgRow) -> Result<ShipmentRecord> {
        let status: String = row.try_get("status")?;
        Ok(ShipmentRecord {
            id: row.try_get::<Uuid, _>("id")?.into(),
            order_id: row.try_get::<Uuid, _>("order_id")?.into(),
            awb_number: row.try_get("awb_number")?,
            pickup_token: row.try_get("pickup_token")?,
            product_code: row.try_get("product_code")?,
            sub_product_code: row.try_get("sub_product_code")?,
            origin_area: row.try_get("origin_area")?,
            destination_area: row.try_get("destination_area")?,
            destination_pincode: row.try_get("destination_pincode")?,
            weight_kg: row.try_get("weight_kg")?,
            declared_value: Money::from_paise(row.try_get("declared_value_paise")?),
            collectible_amount: Money::from_paise(row.try_get("collectible_paise")?),
            status: ShipmentStatus::parse(&status).ok_or(StoreError::InvalidStatus(status))?,
            label_pdf: row.try_get("label_pdf")?,
            expected_delivery_date: row.try_get("expected_delivery_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            shipped_at: row.try_get("shipped_at")?,
            delivered_at: row.try_get("delivered_at")?,
            last_error: row.try_get("last_error")?,
        })
    }

    fn row_to_tracking_event(row: PgRow) -> Result<TrackingEventRecord> {
        Ok(TrackingEventRecord {
            shipment_id: row.try_get::<Uuid, _>("shipment_id")?.into(),
            scan_date: row.try_get("scan_date")?,
            scan_code: row.try_get("scan_code")?,
            scan_description: row.try_get("scan_description")?,
            scanned_location: row.try_get("scanned_location")?,
            instructions: row.try_get("instructions")?,
        })
    }

    fn row_to_outbox(row: PgRow) -> Result<OutboxEntry> {
        let kind: serde_json::Value = row.try_get("kind")?;
        Ok(OutboxEntry {
            id: row.try_get("id")?,
            kind: serde_json::from_value(kind)?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
        })
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, unit_price_paise, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderItemRecord {
                    product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                    product_name: row.try_get("product_name")?,
                    unit_price: Money::from_paise(row.try_get("unit_price_paise")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                })
            })
            .collect()
    }
}

const ORDER_COLUMNS: &str = "id, user_id, shipping, subtotal_paise, coupon_id, discount_percent, \
     total_paise, payment_method, payment_status, paid, transaction_id, provider_payment_id, \
     created_at, updated_at";

const SHIPMENT_COLUMNS: &str = "id, order_id, awb_number, pickup_token, product_code, \
     sub_product_code, origin_area, destination_area, destination_pincode, weight_kg, \
     declared_value_paise, collectible_paise, status, label_pdf, expected_delivery_date, \
     created_at, updated_at, shipped_at, delivered_at, last_error";

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_paise, discounted_price_paise, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_paise = EXCLUDED.price_paise,
                discounted_price_paise = EXCLUDED.discounted_price_paise,
                stock_quantity = EXCLUDED.stock_quantity
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.paise())
        .bind(product.discounted_price.map(|m| m.paise()))
        .bind(product.stock_quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, price_paise, discounted_price_paise, stock_quantity \
             FROM products WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn set_cart_item(&self, user: UserId, product: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user.as_uuid())
                .bind(product.as_str())
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO cart_items (user_id, product_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
                "#,
            )
            .bind(user.as_uuid())
            .bind(product.as_str())
            .bind(quantity as i32)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn get_cart(&self, user: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY product_id",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                })
            })
            .collect()
    }

    async fn reserve_stock(&self, items: &[(ProductId, u32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (product_id, qty) in items {
            let updated = sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $1 \
                 WHERE id = $2 AND stock_quantity >= $1",
            )
            .bind(*qty as i64)
            .bind(product_id.as_str())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                        .bind(product_id.as_str())
                        .fetch_optional(&mut *tx)
                        .await?;

                // Dropping the transaction rolls back earlier decrements.
                return Err(StoreError::StockUnavailable {
                    product: product_id.clone(),
                    requested: *qty,
                    available: available.unwrap_or(0),
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn release_stock(&self, items: &[(ProductId, u32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (product_id, qty) in items {
            sqlx::query("UPDATE products SET stock_quantity = stock_quantity + $1 WHERE id = $2")
                .bind(*qty as i64)
                .bind(product_id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_coupon(&self, coupon: CouponRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, valid_from, valid_to, discount_percent, active,
                                 max_uses, used_count, min_order_amount_paise)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                valid_from = EXCLUDED.valid_from,
                valid_to = EXCLUDED.valid_to,
                discount_percent = EXCLUDED.discount_percent,
                active = EXCLUDED.active,
                max_uses = EXCLUDED.max_uses,
                used_count = EXCLUDED.used_count,
                min_order_amount_paise = EXCLUDED.min_order_amount_paise
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(&coupon.code)
        .bind(coupon.valid_from)
        .bind(coupon.valid_to)
        .bind(coupon.discount_percent as i16)
        .bind(coupon.active)
        .bind(coupon.max_uses as i32)
        .bind(coupon.used_count as i32)
        .bind(coupon.min_order_amount.paise())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<CouponRecord>> {
        let row = sqlx::query(
            "SELECT id, code, valid_from, valid_to, discount_percent, active, max_uses, \
             used_count, min_order_amount_paise \
             FROM coupons WHERE LOWER(code) = LOWER($1)",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_coupon).transpose()
    }

    async fn commit_order(&self, draft: OrderDraft) -> Result<OrderRecord> {
        let mut tx = self.pool.begin().await?;

        let order_id = draft.id;
        let now = Utc::now();
        let shipping_json = serde_json::to_value(&draft.shipping)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, shipping, subtotal_paise, coupon_id,
                                discount_percent, total_paise, payment_method, payment_status,
                                paid, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(draft.user_id.as_uuid())
        .bind(&shipping_json)
        .bind(draft.subtotal.paise())
        .bind(draft.coupon_id.map(|c| c.as_uuid()))
        .bind(draft.discount_percent as i16)
        .bind(draft.total.paise())
        .bind(draft.payment_method.as_str())
        .bind(draft.payment_status.as_str())
        .bind(draft.paid)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, item) in draft.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name,
                                         unit_price_paise, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(item.unit_price.paise())
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await?;

            let updated = sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - $1 \
                 WHERE id = $2 AND stock_quantity >= $1",
            )
            .bind(item.quantity as i64)
            .bind(item.product_id.as_str())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                        .bind(item.product_id.as_str())
                        .fetch_optional(&mut *tx)
                        .await?;

                // Dropping the transaction rolls back the order insert and
                // every decrement made so far.
                return Err(StoreError::StockUnavailable {
                    product: item.product_id.clone(),
                    requested: item.quantity,
                    available: available.unwrap_or(0),
                });
            }
        }

        if let Some(coupon_id) = draft.coupon_id {
            sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
                .bind(coupon_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(draft.user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for kind in &draft.outbox {
            sqlx::query("INSERT INTO outbox (id, kind, created_at) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(serde_json::to_value(kind)?)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(OrderRecord {
            id: order_id,
            user_id: draft.user_id,
            shipping: draft.shipping,
            items: draft.items,
            subtotal: draft.subtotal,
            coupon_id: draft.coupon_id,
            discount_percent: draft.discount_percent,
            total: draft.total,
            payment_method: draft.payment_method,
            payment_status: draft.payment_status,
            paid: draft.paid,
            transaction_id: None,
            provider_payment_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.order_items(id).await?;
                Ok(Some(Self::row_to_order(row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn set_payment_session(&self, id: OrderId, transaction_id: &str) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE orders SET transaction_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(transaction_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }

    async fn find_order_by_transaction(&self, transaction_id: &str) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let id: OrderId = row.try_get::<Uuid, _>("id")?.into();
                let items = self.order_items(id).await?;
                Ok(Some(Self::row_to_order(row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn complete_payment(
        &self,
        id: OrderId,
        provider_payment_id: &str,
        outbox: &[OutboxKind],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET paid = TRUE, payment_status = 'COMPLETED', provider_payment_id = $2,
                updated_at = NOW()
            WHERE id = $1 AND payment_status <> 'COMPLETED'
            "#,
        )
        .bind(id.as_uuid())
        .bind(provider_payment_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(StoreError::OrderNotFound(id)),
            };
        }

        let now = Utc::now();
        for kind in outbox {
            sqlx::query("INSERT INTO outbox (id, kind, created_at) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(serde_json::to_value(kind)?)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn fail_payment_and_restock(&self, id: OrderId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Conditional on PENDING, mirroring complete_payment: a duplicate
        // failure callback, or a failure racing a success, affects zero rows
        // and must not restock.
        let updated = sqlx::query(
            "UPDATE orders SET paid = FALSE, payment_status = 'FAILED', updated_at = NOW() \
             WHERE id = $1 AND payment_status = 'PENDING'",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(StoreError::OrderNotFound(id)),
            };
        }

        sqlx::query(
            r#"
            UPDATE products p
            SET stock_quantity = p.stock_quantity + i.quantity
            FROM order_items i
            WHERE i.order_id = $1 AND p.id = i.product_id
            "#,
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_shipment(&self, shipment: ShipmentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shipments (id, order_id, awb_number, pickup_token, product_code,
                                   sub_product_code, origin_area, destination_area,
                                   destination_pincode, weight_kg, declared_value_paise,
                                   collectible_paise, status, label_pdf, expected_delivery_date,
                                   created_at, updated_at, shipped_at, delivered_at, last_error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20)
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(shipment.order_id.as_uuid())
        .bind(&shipment.awb_number)
        .bind(&shipment.pickup_token)
        .bind(&shipment.product_code)
        .bind(&shipment.sub_product_code)
        .bind(&shipment.origin_area)
        .bind(&shipment.destination_area)
        .bind(&shipment.destination_pincode)
        .bind(shipment.weight_kg)
        .bind(shipment.declared_value.paise())
        .bind(shipment.collectible_amount.paise())
        .bind(shipment.status.as_str())
        .bind(&shipment.label_pdf)
        .bind(shipment.expected_delivery_date)
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .bind(shipment.shipped_at)
        .bind(shipment.delivered_at)
        .bind(&shipment.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_shipment(&self, shipment: &ShipmentRecord) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE shipments
            SET awb_number = $2, pickup_token = $3, destination_area = $4, weight_kg = $5,
                status = $6, label_pdf = $7, expected_delivery_date = $8, updated_at = NOW(),
                shipped_at = $9, delivered_at = $10, last_error = $11
            WHERE id = $1
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(&shipment.awb_number)
        .bind(&shipment.pickup_token)
        .bind(&shipment.destination_area)
        .bind(shipment.weight_kg)
        .bind(shipment.status.as_str())
        .bind(&shipment.label_pdf)
        .bind(shipment.expected_delivery_date)
        .bind(shipment.shipped_at)
        .bind(shipment.delivered_at)
        .bind(&shipment.last_error)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::ShipmentNotFound(shipment.id));
        }
        Ok(())
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<ShipmentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_shipment).transpose()
    }

    async fn get_shipment_by_order(&self, order_id: OrderId) -> Result<Option<ShipmentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_shipment).transpose()
    }

    async fn get_shipment_by_awb(&self, awb_number: &str) -> Result<Option<ShipmentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE awb_number = $1"
        ))
        .bind(awb_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_shipment).transpose()
    }

    async fn active_shipments(&self) -> Result<Vec<ShipmentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments \
             WHERE awb_number IS NOT NULL \
               AND status NOT IN ('delivered', 'cancelled', 'rto_delivered') \
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_shipment).collect()
    }

    async fn shipments_for_pickup(&self, day: NaiveDate) -> Result<Vec<ShipmentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments \
             WHERE created_at::date = $1 AND status = 'booked' \
               AND pickup_token IS NULL AND awb_number IS NOT NULL \
             ORDER BY created_at ASC"
        ))
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_shipment).collect()
    }

    async fn shipments_by_ids(&self, ids: &[ShipmentId]) -> Result<Vec<ShipmentRecord>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_shipment).collect()
    }

    async fn assign_pickup_token(&self, ids: &[ShipmentId], token: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM shipments WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&mut *tx)
            .await?;

        if let Some(missing) = ids.iter().find(|id| !found.contains(&id.as_uuid())) {
            return Err(StoreError::ShipmentNotFound(*missing));
        }

        sqlx::query(
            "UPDATE shipments \
             SET pickup_token = $2, status = 'pickup_scheduled', updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(&uuids)
        .bind(token)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn record_tracking_events(&self, events: &[TrackingEventRecord]) -> Result<usize> {
        let mut inserted = 0;
        for event in events {
            let result = sqlx::query(
                r#"
                INSERT INTO tracking_events (shipment_id, scan_date, scan_code,
                                             scan_description, scanned_location, instructions)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (shipment_id, scan_date, scan_code, scanned_location) DO NOTHING
                "#,
            )
            .bind(event.shipment_id.as_uuid())
            .bind(event.scan_date)
            .bind(&event.scan_code)
            .bind(&event.scan_description)
            .bind(&event.scanned_location)
            .bind(&event.instructions)
            .execute(&self.pool)
            .await?;

            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn tracking_events(&self, shipment: ShipmentId) -> Result<Vec<TrackingEventRecord>> {
        let rows = sqlx::query(
            "SELECT shipment_id, scan_date, scan_code, scan_description, scanned_location, \
             instructions \
             FROM tracking_events WHERE shipment_id = $1 ORDER BY scan_date DESC",
        )
        .bind(shipment.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_tracking_event).collect()
    }

    async fn enqueue_outbox(&self, kind: OutboxKind) -> Result<()> {
        sqlx::query("INSERT INTO outbox (id, kind, created_at) VALUES ($1, $2, NOW())")
            .bind(Uuid::new_v4())
            .bind(serde_json::to_value(&kind)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            "SELECT id, kind, created_at, processed_at FROM outbox \
             WHERE processed_at IS NULL ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_outbox_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE outbox SET processed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
