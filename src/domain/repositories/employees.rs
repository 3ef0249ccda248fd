use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::employees::EmployeeEntity;

#[automock]
#[async_trait]
pub trait EmployeeRepository {
    async fn find_by_id(&self, employee_id: Uuid) -> Result<Option<EmployeeEntity>>;
}
