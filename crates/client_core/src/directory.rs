//! Read-through cache of shipping companies for selection controls.

use shared::domain::{Company, CompanyId};
use tracing::info;

use crate::{ClientError, ShipmentApi};

#[derive(Debug, Clone, Default)]
pub struct CompanyDirectory {
    companies: Vec<Company>,
    active_only: bool,
}

impl CompanyDirectory {
    pub fn from_companies(companies: Vec<Company>, active_only: bool) -> Self {
        let companies = companies
            .into_iter()
            .filter(|company| !active_only || company.active)
            .collect();
        Self {
            companies,
            active_only,
        }
    }

    pub async fn load<A>(api: &A, active_only: bool) -> Result<Self, ClientError>
    where
        A: ShipmentApi + ?Sized,
    {
        let mut directory = Self {
            companies: Vec::new(),
            active_only,
        };
        directory.refresh(api).await?;
        Ok(directory)
    }

    /// On failure the previously cached list is kept.
    pub async fn refresh<A>(&mut self, api: &A) -> Result<(), ClientError>
    where
        A: ShipmentApi + ?Sized,
    {
        let companies = api.list_companies(self.active_only).await?;
        info!(
            count = companies.len(),
            active_only = self.active_only,
            "company directory refreshed"
        );
        self.companies = companies;
        Ok(())
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn find(&self, id: CompanyId) -> Option<&Company> {
        self.companies.iter().find(|company| company.id == id)
    }

    /// The first listed company is preselected.
    pub fn default_selection(&self) -> Option<&Company> {
        self.companies.first()
    }

    /// Merge a company returned by a create/toggle call into the cache.
    pub fn upsert(&mut self, company: Company) {
        let visible = !self.active_only || company.active;
        match self.companies.iter().position(|c| c.id == company.id) {
            Some(index) if visible => self.companies[index] = company,
            Some(index) => {
                self.companies.remove(index);
            }
            None if visible => self.companies.push(company),
            None => {}
        }
    }
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
