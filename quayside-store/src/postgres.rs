use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use quayside_domain::repository::{
    AuditStore, BookingStore, ConfigStore, CredentialStore, IncidentStore, StoreError,
    TimeslotStore,
};
use quayside_domain::{
    Booking, BookingStatus, CapacityConfig, EventCode, GateCredential, Incident, IncidentStatus,
    SlotKey, Timeslot,
};

/// Postgres-backed `TerminalStore`. Queries are runtime-bound so the crate
/// builds without a live database; the schema lives in the workspace
/// `migrations/` directory.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::backend(err)
}

#[derive(FromRow)]
struct TimeslotRow {
    id: Uuid,
    date: NaiveDate,
    hour_start: i16,
    capacity: i32,
    late_capacity: i32,
}

impl From<TimeslotRow> for Timeslot {
    fn from(row: TimeslotRow) -> Self {
        Timeslot {
            id: row.id,
            date: row.date,
            hour_start: row.hour_start as u8,
            capacity: row.capacity,
            late_capacity: row.late_capacity,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    truck_number: String,
    timeslot_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row.status.parse().map_err(StoreError::backend)?;
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            truck_number: row.truck_number,
            timeslot_id: row.timeslot_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialRow {
    id: Uuid,
    booking_id: Uuid,
    token: String,
    created_at: DateTime<Utc>,
}

impl From<CredentialRow> for GateCredential {
    fn from(row: CredentialRow) -> Self {
        GateCredential {
            id: row.id,
            booking_id: row.booking_id,
            token: row.token,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct IncidentRow {
    id: Uuid,
    booking_id: Uuid,
    reporter_id: Uuid,
    message: String,
    status: String,
    response: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = StoreError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let status: IncidentStatus = row.status.parse().map_err(StoreError::backend)?;
        Ok(Incident {
            id: row.id,
            booking_id: row.booking_id,
            reporter_id: row.reporter_id,
            message: row.message,
            status,
            response: row.response,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

fn status_strings(statuses: &[BookingStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl TimeslotStore for PostgresStore {
    async fn timeslot(&self, id: Uuid) -> Result<Option<Timeslot>, StoreError> {
        let row = sqlx::query_as::<_, TimeslotRow>(
            "SELECT id, date, hour_start, capacity, late_capacity FROM timeslots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Timeslot::from))
    }

    async fn find_slot(&self, key: SlotKey) -> Result<Option<Timeslot>, StoreError> {
        let row = sqlx::query_as::<_, TimeslotRow>(
            "SELECT id, date, hour_start, capacity, late_capacity \
             FROM timeslots WHERE date = $1 AND hour_start = $2",
        )
        .bind(key.date)
        .bind(i16::from(key.hour_start))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Timeslot::from))
    }

    async fn get_or_create_slot(
        &self,
        key: SlotKey,
        defaults: CapacityConfig,
    ) -> Result<Timeslot, StoreError> {
        // Idempotent insert: the (date, hour_start) unique constraint makes
        // a concurrent first-creation race harmless.
        sqlx::query(
            "INSERT INTO timeslots (id, date, hour_start, capacity, late_capacity) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (date, hour_start) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(key.date)
        .bind(i16::from(key.hour_start))
        .bind(defaults.capacity)
        .bind(defaults.late_capacity)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.find_slot(key)
            .await?
            .ok_or_else(|| StoreError::backend(format!("timeslot {key} vanished after upsert")))
    }

    async fn slots_after(
        &self,
        after: SlotKey,
        until: NaiveDate,
    ) -> Result<Vec<Timeslot>, StoreError> {
        let rows = sqlx::query_as::<_, TimeslotRow>(
            "SELECT id, date, hour_start, capacity, late_capacity \
             FROM timeslots \
             WHERE (date > $1 OR (date = $1 AND hour_start > $2)) AND date <= $3 \
             ORDER BY date, hour_start",
        )
        .bind(after.date)
        .bind(i16::from(after.hour_start))
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Timeslot::from).collect())
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bookings (id, user_id, truck_number, timeslot_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(&booking.truck_number)
        .bind(booking.timeslot_id)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, user_id, truck_number, timeslot_id, status, created_at, updated_at \
             FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(Booking::try_from).transpose()
    }

    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET timeslot_id = $2, status = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.timeslot_id)
        .bind(booking.status.as_str())
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::backend(format!(
                "booking {} does not exist",
                booking.id
            )));
        }
        Ok(())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn count_active(
        &self,
        timeslot_id: Uuid,
        statuses: &[BookingStatus],
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE timeslot_id = $1 AND status = ANY($2)",
        )
        .bind(timeslot_id)
        .bind(status_strings(statuses))
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(count)
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            "SELECT id, user_id, truck_number, timeslot_id, status, created_at, updated_at \
             FROM bookings WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn insert_credential(
        &self,
        credential: &GateCredential,
    ) -> Result<GateCredential, StoreError> {
        // Same idempotent-insert shape as get_or_create_slot: a concurrent
        // first issuance loses the race harmlessly and reads the winner back.
        sqlx::query(
            "INSERT INTO gate_credentials (id, booking_id, token, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (booking_id) DO NOTHING",
        )
        .bind(credential.id)
        .bind(credential.booking_id)
        .bind(&credential.token)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.credential_for_booking(credential.booking_id)
            .await?
            .ok_or_else(|| {
                StoreError::backend(format!(
                    "credential for booking {} vanished after upsert",
                    credential.booking_id
                ))
            })
    }

    async fn credential_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<GateCredential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, booking_id, token, created_at FROM gate_credentials WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(GateCredential::from))
    }

    async fn credential_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GateCredential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, booking_id, token, created_at FROM gate_credentials WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(GateCredential::from))
    }

    async fn delete_credential_for_booking(&self, booking_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM gate_credentials WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for PostgresStore {
    async fn insert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO incidents (id, booking_id, reporter_id, message, status, response, created_at, resolved_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(incident.id)
        .bind(incident.booking_id)
        .bind(incident.reporter_id)
        .bind(&incident.message)
        .bind(incident.status.as_str())
        .bind(&incident.response)
        .bind(incident.created_at)
        .bind(incident.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn incident(&self, id: Uuid) -> Result<Option<Incident>, StoreError> {
        let row = sqlx::query_as::<_, IncidentRow>(
            "SELECT id, booking_id, reporter_id, message, status, response, created_at, resolved_at \
             FROM incidents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(Incident::try_from).transpose()
    }

    async fn update_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE incidents SET status = $2, response = $3, resolved_at = $4 WHERE id = $1",
        )
        .bind(incident.id)
        .bind(incident.status.as_str())
        .bind(&incident.response)
        .bind(incident.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn pending_incidents(&self) -> Result<Vec<Incident>, StoreError> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            "SELECT id, booking_id, reporter_id, message, status, response, created_at, resolved_at \
             FROM incidents WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(Incident::try_from).collect()
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn append_audit(&self, code: EventCode, message: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO audit_log (id, timestamp, code, message) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(code.as_str())
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for PostgresStore {
    async fn capacity_config(&self) -> Result<CapacityConfig, StoreError> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT capacity, late_capacity FROM capacity_config WHERE singleton = TRUE",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row
            .map(|(capacity, late_capacity)| CapacityConfig::new(capacity, late_capacity))
            .unwrap_or_default())
    }

    async fn set_capacity_config(&self, config: CapacityConfig) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO capacity_config (singleton, capacity, late_capacity) \
             VALUES (TRUE, $1, $2) \
             ON CONFLICT (singleton) DO UPDATE SET capacity = $1, late_capacity = $2",
        )
        .bind(config.capacity)
        .bind(config.late_capacity)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
