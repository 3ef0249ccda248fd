use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::{entities::employees::EmployeeEntity, repositories::employees::EmployeeRepository},
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::employees},
};

pub struct EmployeePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EmployeePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EmployeeRepository for EmployeePostgres {
    async fn find_by_id(&self, employee_id: Uuid) -> Result<Option<EmployeeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = employees::table
            .filter(employees::id.eq(employee_id))
            .select(EmployeeEntity::as_select())
            .first::<EmployeeEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
