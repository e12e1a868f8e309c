//! PostgreSQL store
//!
//! Enumerations are stored as snake_case VARCHAR columns and parsed back when
//! rows are converted into the shared models. Multi-row writes run inside a
//! transaction; status changes use `WHERE status = $expected` so two callers
//! racing on the same row cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;

use shared::{
    ActiveRollFilter, BatchCompletion, BatchStatus, Customer, CustomerOrder, Fabric, FabricKind,
    FabricRoll, OrderStatus, ProductionBatch, ProductionOrder, ProductionPurpose, ProductionType,
    RollStatus, RollUpdate, ScanRecord, ScanType, Shipment, ShipmentItem, ShipmentStatus,
    StockDelta, TraceabilityPayload, WastageRecord, WastageType,
};

use super::{FabricStore, ShipOutcome};
use crate::config::DatabaseConfig;
use crate::error::{map_unique_violation, AppError, AppResult};

/// Rows per multi-row INSERT statement, well under the bind-parameter limit
const INSERT_CHUNK: usize = 1_000;

const BATCH_COLUMNS: &str = "id, batch_number, production_order_id, production_type, fabric_id, \
     planned_quantity, accepted_quantity, wastage_quantity, wastage_percentage, status, notes, \
     created_at, completed_at";

const ROLL_COLUMNS: &str = "id, roll_number, batch_id, fabric_kind, fabric_id, roll_length, \
     remaining_length, status, quality_grade, customer_order_id, color, archived, location, \
     payload, created_at, updated_at";

const SHIPMENT_COLUMNS: &str = "id, shipment_number, customer_order_id, status, tracking_reference, \
     notes, created_at, delivered_at";

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a pool using the database section of the configuration
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await?;
        Ok(Self::new(db))
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

// ============================================================================
// Row types
// ============================================================================

fn parse_column<T>(value: &str, column: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| AppError::Internal(format!("unexpected {} value: {}", column, value)))
}

#[derive(Debug, FromRow)]
struct ProductionOrderRow {
    id: Uuid,
    order_number: String,
    fabric_id: Uuid,
    fabric_kind: String,
    purpose: String,
    customer_order_id: Option<Uuid>,
    color: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductionOrderRow> for ProductionOrder {
    type Error = AppError;

    fn try_from(row: ProductionOrderRow) -> AppResult<Self> {
        Ok(ProductionOrder {
            id: row.id,
            order_number: row.order_number,
            fabric_id: row.fabric_id,
            fabric_kind: parse_column(&row.fabric_kind, "fabric_kind", FabricKind::parse)?,
            purpose: parse_column(&row.purpose, "purpose", ProductionPurpose::parse)?,
            customer_order_id: row.customer_order_id,
            color: row.color,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CustomerOrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    color: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerOrderRow> for CustomerOrder {
    type Error = AppError;

    fn try_from(row: CustomerOrderRow) -> AppResult<Self> {
        Ok(CustomerOrder {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            color: row.color,
            status: parse_column(&row.status, "order status", OrderStatus::parse)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct FabricRow {
    id: Uuid,
    kind: String,
    code: String,
    name: String,
    stock_quantity: Decimal,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FabricRow> for Fabric {
    type Error = AppError;

    fn try_from(row: FabricRow) -> AppResult<Self> {
        Ok(Fabric {
            id: row.id,
            kind: parse_column(&row.kind, "fabric kind", FabricKind::parse)?,
            code: row.code,
            name: row.name,
            stock_quantity: row.stock_quantity,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    batch_number: String,
    production_order_id: Uuid,
    production_type: String,
    fabric_id: Uuid,
    planned_quantity: Decimal,
    accepted_quantity: Option<Decimal>,
    wastage_quantity: Decimal,
    wastage_percentage: Decimal,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for ProductionBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> AppResult<Self> {
        Ok(ProductionBatch {
            id: row.id,
            batch_number: row.batch_number,
            production_order_id: row.production_order_id,
            production_type: parse_column(
                &row.production_type,
                "production_type",
                ProductionType::parse,
            )?,
            fabric_id: row.fabric_id,
            planned_quantity: row.planned_quantity,
            accepted_quantity: row.accepted_quantity,
            wastage_quantity: row.wastage_quantity,
            wastage_percentage: row.wastage_percentage,
            status: parse_column(&row.status, "batch status", BatchStatus::parse)?,
            notes: row.notes,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WastageRow {
    id: Uuid,
    batch_id: Uuid,
    wastage_type: String,
    quantity: Decimal,
    reason: Option<String>,
    recorded_by: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<WastageRow> for WastageRecord {
    type Error = AppError;

    fn try_from(row: WastageRow) -> AppResult<Self> {
        Ok(WastageRecord {
            id: row.id,
            batch_id: row.batch_id,
            wastage_type: parse_column(&row.wastage_type, "wastage_type", WastageType::parse)?,
            quantity: row.quantity,
            reason: row.reason,
            recorded_by: row.recorded_by,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RollRow {
    id: Uuid,
    roll_number: String,
    batch_id: Uuid,
    fabric_kind: String,
    fabric_id: Uuid,
    roll_length: Decimal,
    remaining_length: Decimal,
    status: String,
    quality_grade: String,
    customer_order_id: Option<Uuid>,
    color: Option<String>,
    archived: bool,
    location: Option<String>,
    payload: Json<TraceabilityPayload>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RollRow> for FabricRoll {
    type Error = AppError;

    fn try_from(row: RollRow) -> AppResult<Self> {
        Ok(FabricRoll {
            id: row.id,
            roll_number: row.roll_number,
            batch_id: row.batch_id,
            fabric_kind: parse_column(&row.fabric_kind, "fabric_kind", FabricKind::parse)?,
            fabric_id: row.fabric_id,
            roll_length: row.roll_length,
            remaining_length: row.remaining_length,
            status: parse_column(&row.status, "roll status", RollStatus::parse)?,
            quality_grade: row.quality_grade,
            customer_order_id: row.customer_order_id,
            color: row.color,
            archived: row.archived,
            location: row.location,
            payload: row.payload.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScanRow {
    id: Uuid,
    roll_id: Uuid,
    roll_number: String,
    scan_type: String,
    previous_status: String,
    new_status: String,
    location: Option<String>,
    scanned_by: String,
    notes: Option<String>,
    scanned_at: DateTime<Utc>,
}

impl TryFrom<ScanRow> for ScanRecord {
    type Error = AppError;

    fn try_from(row: ScanRow) -> AppResult<Self> {
        Ok(ScanRecord {
            id: row.id,
            roll_id: row.roll_id,
            roll_number: row.roll_number,
            scan_type: row
                .scan_type
                .parse::<ScanType>()
                .map_err(AppError::Internal)?,
            previous_status: parse_column(&row.previous_status, "previous_status", RollStatus::parse)?,
            new_status: parse_column(&row.new_status, "new_status", RollStatus::parse)?,
            location: row.location,
            scanned_by: row.scanned_by,
            notes: row.notes,
            scanned_at: row.scanned_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    shipment_number: String,
    customer_order_id: Uuid,
    status: String,
    tracking_reference: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = AppError;

    fn try_from(row: ShipmentRow) -> AppResult<Self> {
        Ok(Shipment {
            id: row.id,
            shipment_number: row.shipment_number,
            customer_order_id: row.customer_order_id,
            status: parse_column(&row.status, "shipment status", ShipmentStatus::parse)?,
            tracking_reference: row.tracking_reference,
            notes: row.notes,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ShipmentItemRow {
    id: Uuid,
    shipment_id: Uuid,
    roll_id: Uuid,
    roll_number: String,
    quantity: Decimal,
}

impl From<ShipmentItemRow> for ShipmentItem {
    fn from(row: ShipmentItemRow) -> Self {
        ShipmentItem {
            id: row.id,
            shipment_id: row.shipment_id,
            roll_id: row.roll_id,
            roll_number: row.roll_number,
            quantity: row.quantity,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Store implementation
// ============================================================================

/// Conditional roll update shared by single transitions and shipments.
/// `color` is only filled when the roll has none yet.
async fn update_roll_where_status<'c, E>(
    executor: E,
    roll_number: &str,
    expected: RollStatus,
    update: &RollUpdate,
) -> AppResult<Option<FabricRoll>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RollRow>(&format!(
        r#"
        UPDATE fabric_rolls
        SET status = COALESCE($1, status),
            remaining_length = COALESCE($2, remaining_length),
            archived = COALESCE($3, archived),
            location = COALESCE($4, location),
            customer_order_id = COALESCE($5, customer_order_id),
            color = COALESCE(color, $6),
            updated_at = NOW()
        WHERE roll_number = $7 AND status = $8
        RETURNING {}
        "#,
        ROLL_COLUMNS
    ))
    .bind(update.status.map(|s| s.as_str()))
    .bind(update.remaining_length)
    .bind(update.archived)
    .bind(&update.location)
    .bind(update.customer_order_id)
    .bind(&update.color)
    .bind(roll_number)
    .bind(expected.as_str())
    .fetch_optional(executor)
    .await?
    .map(FabricRoll::try_from)
    .transpose()
}

#[async_trait]
impl FabricStore for PgStore {
    async fn next_sequence(&self, prefix: &str, day: NaiveDate) -> AppResult<i64> {
        let value = sqlx::query_scalar::<_, i64>("SELECT next_document_sequence($1, $2)")
            .bind(prefix)
            .bind(day)
            .fetch_one(&self.db)
            .await?;
        Ok(value)
    }

    async fn get_production_order(&self, id: Uuid) -> AppResult<Option<ProductionOrder>> {
        sqlx::query_as::<_, ProductionOrderRow>(
            r#"
            SELECT id, order_number, fabric_id, fabric_kind, purpose, customer_order_id, color, created_at
            FROM production_orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(ProductionOrder::try_from)
        .transpose()
    }

    async fn get_customer_order(&self, id: Uuid) -> AppResult<Option<CustomerOrder>> {
        sqlx::query_as::<_, CustomerOrderRow>(
            r#"
            SELECT id, order_number, customer_id, color, status, created_at, updated_at
            FROM customer_orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(CustomerOrder::try_from)
        .transpose()
    }

    async fn get_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| Customer { id: r.0, name: r.1 }))
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE customer_orders SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_fabric(&self, kind: FabricKind, id: Uuid) -> AppResult<Option<Fabric>> {
        sqlx::query_as::<_, FabricRow>(
            "SELECT id, kind, code, name, stock_quantity, updated_at FROM fabrics WHERE id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.db)
        .await?
        .map(Fabric::try_from)
        .transpose()
    }

    async fn insert_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO production_batches ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            BATCH_COLUMNS
        ))
        .bind(batch.id)
        .bind(&batch.batch_number)
        .bind(batch.production_order_id)
        .bind(batch.production_type.as_str())
        .bind(batch.fabric_id)
        .bind(batch.planned_quantity)
        .bind(batch.accepted_quantity)
        .bind(batch.wastage_quantity)
        .bind(batch.wastage_percentage)
        .bind(batch.status.as_str())
        .bind(&batch.notes)
        .bind(batch.created_at)
        .bind(batch.completed_at)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "batch_number"))?;
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> AppResult<Option<ProductionBatch>> {
        sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM production_batches WHERE id = $1",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(ProductionBatch::try_from)
        .transpose()
    }

    async fn complete_batch(
        &self,
        id: Uuid,
        completion: &BatchCompletion,
        stock: Option<StockDelta>,
    ) -> AppResult<Option<ProductionBatch>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            UPDATE production_batches
            SET accepted_quantity = $1, wastage_quantity = $2, wastage_percentage = $3,
                status = 'completed', completed_at = $4
            WHERE id = $5 AND status = 'in_progress'
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(completion.accepted_quantity)
        .bind(completion.wastage_quantity)
        .bind(completion.wastage_percentage)
        .bind(completion.completed_at)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(delta) = stock {
            let updated = sqlx::query(
                r#"
                UPDATE fabrics
                SET stock_quantity = stock_quantity + $1, updated_at = NOW()
                WHERE id = $2 AND kind = $3
                "#,
            )
            .bind(delta.quantity)
            .bind(delta.fabric_id)
            .bind(delta.fabric_kind.as_str())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound("Fabric".to_string()));
            }
        }

        tx.commit().await?;

        Ok(Some(row.try_into()?))
    }

    async fn update_batch_status(
        &self,
        id: Uuid,
        expected: BatchStatus,
        next: BatchStatus,
    ) -> AppResult<Option<ProductionBatch>> {
        sqlx::query_as::<_, BatchRow>(&format!(
            "UPDATE production_batches SET status = $1 WHERE id = $2 AND status = $3 RETURNING {}",
            BATCH_COLUMNS
        ))
        .bind(next.as_str())
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&self.db)
        .await?
        .map(ProductionBatch::try_from)
        .transpose()
    }

    async fn insert_wastage_record(&self, record: &WastageRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wastage_records (id, batch_id, wastage_type, quantity, reason, recorded_by, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.batch_id)
        .bind(record.wastage_type.as_str())
        .bind(record.quantity)
        .bind(&record.reason)
        .bind(&record.recorded_by)
        .bind(record.recorded_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_wastage_records(&self, batch_id: Uuid) -> AppResult<Vec<WastageRecord>> {
        let rows = sqlx::query_as::<_, WastageRow>(
            r#"
            SELECT id, batch_id, wastage_type, quantity, reason, recorded_by, recorded_at
            FROM wastage_records
            WHERE batch_id = $1
            ORDER BY recorded_at
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn insert_rolls(&self, rolls: &[FabricRoll]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for chunk in rolls.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO fabric_rolls ({}) ", ROLL_COLUMNS));
            builder.push_values(chunk, |mut b, roll| {
                b.push_bind(roll.id)
                    .push_bind(&roll.roll_number)
                    .push_bind(roll.batch_id)
                    .push_bind(roll.fabric_kind.as_str())
                    .push_bind(roll.fabric_id)
                    .push_bind(roll.roll_length)
                    .push_bind(roll.remaining_length)
                    .push_bind(roll.status.as_str())
                    .push_bind(&roll.quality_grade)
                    .push_bind(roll.customer_order_id)
                    .push_bind(&roll.color)
                    .push_bind(roll.archived)
                    .push_bind(&roll.location)
                    .push_bind(Json(&roll.payload))
                    .push_bind(roll.created_at)
                    .push_bind(roll.updated_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_unique_violation(e, "roll_number"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_roll(&self, roll_number: &str) -> AppResult<Option<FabricRoll>> {
        sqlx::query_as::<_, RollRow>(&format!(
            "SELECT {} FROM fabric_rolls WHERE roll_number = $1",
            ROLL_COLUMNS
        ))
        .bind(roll_number)
        .fetch_optional(&self.db)
        .await?
        .map(FabricRoll::try_from)
        .transpose()
    }

    async fn list_rolls_for_batch(&self, batch_id: Uuid) -> AppResult<Vec<FabricRoll>> {
        let rows = sqlx::query_as::<_, RollRow>(&format!(
            "SELECT {} FROM fabric_rolls WHERE batch_id = $1 ORDER BY roll_number",
            ROLL_COLUMNS
        ))
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn list_rolls_for_order(
        &self,
        order_id: Uuid,
        status: RollStatus,
        kind: FabricKind,
    ) -> AppResult<Vec<FabricRoll>> {
        let rows = sqlx::query_as::<_, RollRow>(&format!(
            r#"
            SELECT {}
            FROM fabric_rolls
            WHERE customer_order_id = $1 AND status = $2 AND fabric_kind = $3
            ORDER BY roll_number
            "#,
            ROLL_COLUMNS
        ))
        .bind(order_id)
        .bind(status.as_str())
        .bind(kind.as_str())
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn list_active_rolls(&self, filter: &ActiveRollFilter) -> AppResult<Vec<FabricRoll>> {
        let rows = sqlx::query_as::<_, RollRow>(&format!(
            r#"
            SELECT {}
            FROM fabric_rolls
            WHERE archived = FALSE
              AND ($1::VARCHAR IS NULL OR fabric_kind = $1)
              AND ($2::UUID IS NULL OR fabric_id = $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
              AND ($4::VARCHAR IS NULL OR location = $4)
            ORDER BY created_at, roll_number
            "#,
            ROLL_COLUMNS
        ))
        .bind(filter.fabric_kind.map(|k| k.as_str()))
        .bind(filter.fabric_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.location)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn update_roll_if_status(
        &self,
        roll_number: &str,
        expected: RollStatus,
        update: &RollUpdate,
    ) -> AppResult<Option<FabricRoll>> {
        update_roll_where_status(&self.db, roll_number, expected, update).await
    }

    async fn archive_batch_rolls(&self, batch_id: Uuid, kind: FabricKind) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fabric_rolls
            SET archived = TRUE, updated_at = NOW()
            WHERE batch_id = $1 AND fabric_kind = $2 AND archived = FALSE
            "#,
        )
        .bind(batch_id)
        .bind(kind.as_str())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_scan_record(&self, record: &ScanRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO roll_scans (id, roll_id, roll_number, scan_type, previous_status, new_status,
                                    location, scanned_by, notes, scanned_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.roll_id)
        .bind(&record.roll_number)
        .bind(record.scan_type.as_str())
        .bind(record.previous_status.as_str())
        .bind(record.new_status.as_str())
        .bind(&record.location)
        .bind(&record.scanned_by)
        .bind(&record.notes)
        .bind(record.scanned_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_scan_records(&self, roll_id: Uuid) -> AppResult<Vec<ScanRecord>> {
        let rows = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, roll_id, roll_number, scan_type, previous_status, new_status,
                   location, scanned_by, notes, scanned_at
            FROM roll_scans
            WHERE roll_id = $1
            ORDER BY scanned_at
            "#,
        )
        .bind(roll_id)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn ship_rolls(
        &self,
        shipment: &Shipment,
        items: &[ShipmentItem],
        expected: RollStatus,
        update: &RollUpdate,
    ) -> AppResult<ShipOutcome> {
        let mut tx = self.db.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO shipments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            SHIPMENT_COLUMNS
        ))
        .bind(shipment.id)
        .bind(&shipment.shipment_number)
        .bind(shipment.customer_order_id)
        .bind(shipment.status.as_str())
        .bind(&shipment.tracking_reference)
        .bind(&shipment.notes)
        .bind(shipment.created_at)
        .bind(shipment.delivered_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "shipment_number"))?;

        for chunk in items.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO shipment_items (id, shipment_id, roll_id, roll_number, quantity) ",
            );
            builder.push_values(chunk, |mut b, item| {
                b.push_bind(item.id)
                    .push_bind(item.shipment_id)
                    .push_bind(item.roll_id)
                    .push_bind(&item.roll_number)
                    .push_bind(item.quantity);
            });
            builder.build().execute(&mut *tx).await?;
        }

        // Returning early drops `tx`, which rolls everything back
        let mut shipped = Vec::with_capacity(items.len());
        for item in items {
            match update_roll_where_status(&mut *tx, &item.roll_number, expected, update).await {
                Ok(Some(roll)) => shipped.push(roll),
                Ok(None) => {
                    return Ok(ShipOutcome::Rejected {
                        roll_number: item.roll_number.clone(),
                        reason: format!("roll is missing or no longer {}", expected),
                    })
                }
                Err(e) => {
                    return Ok(ShipOutcome::Rejected {
                        roll_number: item.roll_number.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        tx.commit().await?;
        Ok(ShipOutcome::Shipped(shipped))
    }

    async fn list_shipments_for_order(&self, order_id: Uuid) -> AppResult<Vec<Shipment>> {
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            SELECT {}
            FROM shipments
            WHERE customer_order_id = $1
            ORDER BY created_at
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn list_shipment_items(&self, shipment_id: Uuid) -> AppResult<Vec<ShipmentItem>> {
        let rows = sqlx::query_as::<_, ShipmentItemRow>(
            r#"
            SELECT id, shipment_id, roll_id, roll_number, quantity
            FROM shipment_items
            WHERE shipment_id = $1
            ORDER BY roll_number
            "#,
        )
        .bind(shipment_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(ShipmentItem::from).collect())
    }

    async fn mark_shipment_delivered(
        &self,
        shipment_id: Uuid,
        delivered_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Option<Shipment>> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            UPDATE shipments
            SET status = 'delivered',
                delivered_at = $1,
                notes = CASE
                    WHEN $2::TEXT IS NULL THEN notes
                    WHEN notes IS NULL THEN $2
                    ELSE notes || E'\n' || $2
                END
            WHERE id = $3 AND status = 'shipped'
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(delivered_at)
        .bind(notes)
        .bind(shipment_id)
        .fetch_optional(&self.db)
        .await?
        .map(Shipment::try_from)
        .transpose()
    }

    async fn increment_fabric_stock(&self, delta: StockDelta) -> AppResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE fabrics
            SET stock_quantity = stock_quantity + $1, updated_at = NOW()
            WHERE id = $2 AND kind = $3
            RETURNING stock_quantity
            "#,
        )
        .bind(delta.quantity)
        .bind(delta.fabric_id)
        .bind(delta.fabric_kind.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Fabric".to_string()))
    }

    async fn sum_active_roll_length(&self, kind: FabricKind, fabric_id: Uuid) -> AppResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(remaining_length), 0)
            FROM fabric_rolls
            WHERE fabric_kind = $1 AND fabric_id = $2 AND archived = FALSE
              AND status IN ('available', 'allocated', 'partially_allocated')
            "#,
        )
        .bind(kind.as_str())
        .bind(fabric_id)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }

    async fn set_fabric_stock(
        &self,
        kind: FabricKind,
        fabric_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE fabrics
            SET stock_quantity = $1, updated_at = NOW()
            WHERE id = $2 AND kind = $3
            RETURNING stock_quantity
            "#,
        )
        .bind(quantity)
        .bind(fabric_id)
        .bind(kind.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Fabric".to_string()))
    }
}
