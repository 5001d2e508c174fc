//! Source of companies holding an active contract.

use crate::error::Result;
use async_trait::async_trait;

/// External contract service, queried once per listing request
#[async_trait]
pub trait ActiveContractSource: Send + Sync {
    async fn companies_with_active_contracts(&self) -> Result<Vec<i64>>;
}

/// Fixed list of company ids
#[derive(Debug, Clone, Default)]
pub struct StaticActiveContracts {
    company_ids: Vec<i64>,
}

impl StaticActiveContracts {
    pub fn new(company_ids: Vec<i64>) -> Self {
        Self { company_ids }
    }
}

#[async_trait]
impl ActiveContractSource for StaticActiveContracts {
    async fn companies_with_active_contracts(&self) -> Result<Vec<i64>> {
        Ok(self.company_ids.clone())
    }
}
