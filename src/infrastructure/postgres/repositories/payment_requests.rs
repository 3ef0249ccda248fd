use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{insert_into, prelude::*, update};
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_requests::{NewPaymentRequestEntity, PaymentRequestEntity},
        repositories::payment_requests::PaymentRequestRepository,
        value_objects::{
            enums::payment_request_statuses::PaymentRequestStatus,
            pay_periods::PayPeriod,
            payments::{ApprovalOutcome, RecordPaymentOutcome},
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad, schema::payment_requests,
    },
};

pub struct PaymentRequestPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentRequestPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn active_statuses() -> [String; 2] {
    [
        PaymentRequestStatus::PendingConfirmation.to_string(),
        PaymentRequestStatus::Recorded.to_string(),
    ]
}

#[async_trait]
impl PaymentRequestRepository for PaymentRequestPostgres {
    async fn record_payment(
        &self,
        payment: NewPaymentRequestEntity,
    ) -> Result<RecordPaymentOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<RecordPaymentOutcome, anyhow::Error, _>(|conn| {
            let existing = payment_requests::table
                .filter(
                    payment_requests::gateway_transaction_id
                        .eq(&payment.gateway_transaction_id),
                )
                .select(PaymentRequestEntity::as_select())
                .first::<PaymentRequestEntity>(conn)
                .optional()?;
            if let Some(row) = existing {
                return Ok(RecordPaymentOutcome::AlreadyRecorded(row));
            }

            let active = payment_requests::table
                .filter(payment_requests::employee_id.eq(payment.employee_id))
                .filter(payment_requests::month.eq(payment.month))
                .filter(payment_requests::year.eq(payment.year))
                .filter(payment_requests::status.eq_any(active_statuses()))
                .select(payment_requests::id)
                .first::<Uuid>(conn)
                .optional()?;
            if active.is_some() {
                return Ok(RecordPaymentOutcome::DuplicateActivePeriod);
            }

            // The unique index on gateway_transaction_id remains the
            // authoritative guard under concurrent writers; a lost race
            // resolves to the row the winner inserted. Transaction-id
            // conflicts are absorbed by ON CONFLICT DO NOTHING, so a
            // surviving unique violation is the one-active-per-period index.
            let inserted = match insert_into(payment_requests::table)
                .values(&payment)
                .on_conflict(payment_requests::gateway_transaction_id)
                .do_nothing()
                .returning(PaymentRequestEntity::as_returning())
                .get_result::<PaymentRequestEntity>(conn)
                .optional()
            {
                Ok(row) => row,
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                )) => return Ok(RecordPaymentOutcome::DuplicateActivePeriod),
                Err(err) => return Err(err.into()),
            };

            match inserted {
                Some(row) => Ok(RecordPaymentOutcome::Inserted(row)),
                None => {
                    let row = payment_requests::table
                        .filter(
                            payment_requests::gateway_transaction_id
                                .eq(&payment.gateway_transaction_id),
                        )
                        .select(PaymentRequestEntity::as_select())
                        .first::<PaymentRequestEntity>(conn)?;
                    Ok(RecordPaymentOutcome::AlreadyRecorded(row))
                }
            }
        })?;

        Ok(outcome)
    }

    async fn has_active_request(&self, employee_id: Uuid, period: PayPeriod) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let active = payment_requests::table
            .filter(payment_requests::employee_id.eq(employee_id))
            .filter(payment_requests::month.eq(period.month()))
            .filter(payment_requests::year.eq(period.year()))
            .filter(payment_requests::status.eq_any(active_statuses()))
            .select(payment_requests::id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(active.is_some())
    }

    async fn find_by_transaction_id(
        &self,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentRequestEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payment_requests::table
            .filter(payment_requests::gateway_transaction_id.eq(gateway_transaction_id))
            .select(PaymentRequestEntity::as_select())
            .first::<PaymentRequestEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn approve_and_pay(
        &self,
        request_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<ApprovalOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Single compare-and-set: the row must still be `recorded` with no
        // payment_date. A concurrent second approval matches zero rows.
        let updated = update(
            payment_requests::table
                .filter(payment_requests::id.eq(request_id))
                .filter(
                    payment_requests::status.eq(PaymentRequestStatus::Recorded.to_string()),
                )
                .filter(payment_requests::payment_date.is_null()),
        )
        .set((
            payment_requests::status.eq(PaymentRequestStatus::ApprovedPaid.to_string()),
            payment_requests::payment_date.eq(Some(paid_at)),
        ))
        .returning(PaymentRequestEntity::as_returning())
        .get_result::<PaymentRequestEntity>(&mut conn)
        .optional()?;

        if let Some(row) = updated {
            return Ok(ApprovalOutcome::Approved(row));
        }

        let current = payment_requests::table
            .filter(payment_requests::id.eq(request_id))
            .select(PaymentRequestEntity::as_select())
            .first::<PaymentRequestEntity>(&mut conn)
            .optional()?;

        match current {
            None => Ok(ApprovalOutcome::NotFound),
            Some(row) => match row.status() {
                PaymentRequestStatus::ApprovedPaid => Ok(ApprovalOutcome::AlreadyPaid),
                status => Ok(ApprovalOutcome::InvalidState(status)),
            },
        }
    }

    async fn list_by_email(
        &self,
        email: &str,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<PaymentRequestEntity>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = payment_requests::table
            .filter(payment_requests::employee_email.eq(email))
            .count()
            .get_result::<i64>(&mut conn)?;

        let rows = payment_requests::table
            .filter(payment_requests::employee_email.eq(email))
            .order(payment_requests::requested_at.desc())
            .offset((page - 1) * limit)
            .limit(limit)
            .select(PaymentRequestEntity::as_select())
            .load::<PaymentRequestEntity>(&mut conn)?;

        Ok((rows, total))
    }

    async fn list_all(&self) -> Result<Vec<PaymentRequestEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // DESC puts the unapproved rows (NULL payment_date) first.
        let rows = payment_requests::table
            .order((
                payment_requests::payment_date.desc(),
                payment_requests::requested_at.desc(),
            ))
            .select(PaymentRequestEntity::as_select())
            .load::<PaymentRequestEntity>(&mut conn)?;

        Ok(rows)
    }
}
