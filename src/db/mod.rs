mod from_row;
mod schema;

pub mod licenses;
pub mod notifications;
pub mod orders;
pub mod referrals;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::binding::DeviceBindingGuard;
use crate::db::licenses::LicenseStore;
use crate::db::notifications::NotificationQueue;
use crate::db::orders::OrderStore;
use crate::db::referrals::ReferralLedger;
use crate::exchange::ExchangeEngine;
use crate::hooks::EntitlementHook;
use crate::token::TokenCodec;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    /// Raw pool handle; the stores below each hold their own clone.
    pub db: DbPool,
    pub licenses: LicenseStore,
    pub binding: DeviceBindingGuard,
    pub orders: OrderStore,
    pub notifications: NotificationQueue,
    pub referrals: ReferralLedger,
    pub codec: TokenCodec,
    pub exchange: ExchangeEngine,
    /// Bearer credential for the service/admin surface.
    pub service_token: String,
    /// Clients below this version are told to update. None disables the check.
    pub min_client_version: Option<String>,
}

impl AppState {
    pub fn new(
        db: DbPool,
        codec: TokenCodec,
        hooks: Arc<dyn EntitlementHook>,
        service_token: String,
        min_client_version: Option<String>,
    ) -> Self {
        let licenses = LicenseStore::new(db.clone());
        let exchange = ExchangeEngine::new(licenses.clone(), codec.clone(), hooks);
        Self {
            binding: DeviceBindingGuard::new(licenses.clone()),
            orders: OrderStore::new(db.clone()),
            notifications: NotificationQueue::new(db.clone()),
            referrals: ReferralLedger::new(db.clone()),
            licenses,
            exchange,
            codec,
            db,
            service_token,
            min_client_version,
        }
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
