use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::config::{PolicyConfig, RewardConfig};
use crate::marketplace::domain::{
    ListingDraft, ListingPurpose, PropertyType, User, UserRegistration, UserRole,
};
use crate::marketplace::money::Money;
use crate::marketplace::store::{MarketplaceStore, MemoryStore, StoreError, StoreTransaction};
use crate::marketplace::{marketplace_router, MarketplaceService};

pub(super) fn money(raw: &str) -> Money {
    raw.parse().expect("valid amount")
}

pub(super) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub(super) fn policy_config() -> PolicyConfig {
    PolicyConfig::default()
}

pub(super) fn reward_config() -> RewardConfig {
    RewardConfig {
        default_pool_amount: money("500.00"),
    }
}

pub(super) fn build_service() -> (MarketplaceService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = MarketplaceService::new(store.clone(), policy_config(), reward_config());
    (service, store)
}

pub(super) fn register(
    service: &MarketplaceService<MemoryStore>,
    email: &str,
    role: UserRole,
) -> User {
    service
        .register_user(UserRegistration {
            email: email.to_string(),
            password: "correct-horse".to_string(),
            full_name: format!("{} user", role.label()),
            phone_number: None,
            role,
        })
        .expect("registration succeeds")
}

/// Admin, agent, landlord and seeker registered against a fresh store.
pub(super) struct Cast {
    pub admin: User,
    pub agent: User,
    pub landlord: User,
    pub seeker: User,
}

pub(super) fn cast(service: &MarketplaceService<MemoryStore>) -> Cast {
    Cast {
        admin: register(service, "admin@propad.test", UserRole::Admin),
        agent: register(service, "agent@propad.test", UserRole::Agent),
        landlord: register(service, "landlord@propad.test", UserRole::Landlord),
        seeker: register(service, "seeker@propad.test", UserRole::Seeker),
    }
}

pub(super) fn draft(title: &str, description: &str) -> ListingDraft {
    ListingDraft {
        title: title.to_string(),
        description: description.to_string(),
        price: money("650.00"),
        currency: "USD".to_string(),
        location_city: "Harare".to_string(),
        location_area: "Borrowdale".to_string(),
        bedrooms: Some(3),
        bathrooms: Some(2),
        property_type: PropertyType::House,
        listing_purpose: ListingPurpose::Rent,
        tags: vec!["garden".to_string()],
        amenities: vec!["borehole".to_string()],
        media_items: Vec::new(),
    }
}

pub(super) fn clean_draft() -> ListingDraft {
    draft(
        "Garden cottage in Borrowdale",
        "Two bedroom cottage with solar backup and secure parking.",
    )
}

pub(super) struct UnavailableStore;

impl MarketplaceStore for UnavailableStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(service: MarketplaceService<MemoryStore>) -> axum::Router {
    marketplace_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "unexpected status for response"
    );
}
