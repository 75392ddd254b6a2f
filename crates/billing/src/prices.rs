//! Mapping between plan names and configured Stripe price ids.

use tlx_core::config::BillingConfig;

use crate::plans::PlanName;

#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    pub free: Option<String>,
    pub pro: Option<String>,
    pub business: Option<String>,
}

impl PriceBook {
    pub fn from_config(config: &BillingConfig) -> Self {
        let clean = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            free: clean(&config.price_free),
            pro: clean(&config.price_pro),
            business: clean(&config.price_business),
        }
    }

    pub fn price_for(&self, plan: PlanName) -> Option<&str> {
        match plan {
            PlanName::Free => self.free.as_deref(),
            PlanName::Pro => self.pro.as_deref(),
            PlanName::Business => self.business.as_deref(),
            PlanName::Enterprise => None,
        }
    }

    pub fn plan_for(&self, price_id: &str) -> Option<PlanName> {
        let price_id = price_id.trim();
        if price_id.is_empty() {
            return None;
        }
        [PlanName::Free, PlanName::Pro, PlanName::Business]
            .into_iter()
            .find(|plan| self.price_for(*plan) == Some(price_id))
    }
}
