mod denomination_properties;
mod draft_building;
mod payment_ledger;
mod relay_scoring;
