pub mod fingerprint;
pub mod geo;
pub mod ledger;
pub mod manager;
pub mod sources;
pub mod validate;

pub use fingerprint::{Identity, Viewport};
pub use geo::{GeoPoint, GeoResolver};
pub use ledger::ProxyLedger;
pub use manager::IdentityManager;
pub use sources::{ProviderApiSource, ProxyCandidate, ProxySource, ScrapedListSource};
pub use validate::{ProxyValidator, WhatIsMyIpValidator};
