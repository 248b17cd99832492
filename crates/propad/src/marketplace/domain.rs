use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::money::Money;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier for a registered marketplace user.
    UserId
);
entity_id!(
    /// Identifier for a property listing.
    ListingId
);
entity_id!(InquiryId);
entity_id!(RuleId);
entity_id!(EventId);
entity_id!(PoolId);
entity_id!(PayoutId);
entity_id!(AuditId);
entity_id!(AnnouncementId);
entity_id!(PartnerId);

/// Marketplace roles used by capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Agent,
    Landlord,
    #[default]
    Seeker,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Agent => "agent",
            UserRole::Landlord => "landlord",
            UserRole::Seeker => "seeker",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registered account. Credentials are held by the identity provider, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Inbound account registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRegistration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// Moderation lifecycle of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    #[default]
    PendingReview,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::PendingReview => "pending_review",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Commercial,
    Land,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingPurpose {
    Rent,
    Sale,
    Lease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(default)]
    pub media_type: MediaType,
}

/// Stored property listing. Relationships are held as ids only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub price: Money,
    pub currency: String,
    pub location_city: String,
    pub location_area: String,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub property_type: PropertyType,
    pub listing_purpose: ListingPurpose,
    pub status: ListingStatus,
    pub is_featured: bool,
    pub tags: Vec<String>,
    pub amenities: Vec<String>,
    pub media_items: Vec<MediaItem>,
    pub owner_id: UserId,
    pub agent_id: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_visible_to(&self, viewer: Option<UserId>) -> bool {
        self.status == ListingStatus::Approved
            || viewer.is_some_and(|id| id == self.owner_id || Some(id) == self.agent_id)
    }
}

pub(crate) fn listing_text(title: &str, description: &str) -> String {
    format!("{title}\n{description}")
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Listing payload submitted by landlords and agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub location_city: String,
    pub location_area: String,
    #[serde(default)]
    pub bedrooms: Option<u8>,
    #[serde(default)]
    pub bathrooms: Option<u8>,
    pub property_type: PropertyType,
    pub listing_purpose: ListingPurpose,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub media_items: Vec<MediaItem>,
}

/// Partial listing update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub currency: Option<String>,
    pub location_city: Option<String>,
    pub location_area: Option<String>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub property_type: Option<PropertyType>,
    pub listing_purpose: Option<ListingPurpose>,
    pub tags: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub status: Option<ListingStatus>,
    pub is_featured: Option<bool>,
    pub media_items: Option<Vec<MediaItem>>,
}

impl ListingUpdate {
    pub fn touches_text(&self) -> bool {
        self.title.is_some() || self.description.is_some()
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut mark = |present: bool, name: &'static str| {
            if present {
                fields.push(name);
            }
        };
        mark(self.title.is_some(), "title");
        mark(self.description.is_some(), "description");
        mark(self.price.is_some(), "price");
        mark(self.currency.is_some(), "currency");
        mark(self.location_city.is_some(), "location_city");
        mark(self.location_area.is_some(), "location_area");
        mark(self.bedrooms.is_some(), "bedrooms");
        mark(self.bathrooms.is_some(), "bathrooms");
        mark(self.property_type.is_some(), "property_type");
        mark(self.listing_purpose.is_some(), "listing_purpose");
        mark(self.tags.is_some(), "tags");
        mark(self.amenities.is_some(), "amenities");
        mark(self.status.is_some(), "status");
        mark(self.is_featured.is_some(), "is_featured");
        mark(self.media_items.is_some(), "media_items");
        fields
    }

    /// Merged policy text using the listing's current values for absent fields.
    pub fn policy_text_for(&self, listing: &Listing) -> String {
        listing_text(
            self.title.as_deref().unwrap_or(&listing.title),
            self.description.as_deref().unwrap_or(&listing.description),
        )
    }

    pub fn apply_to(self, listing: &mut Listing) {
        if let Some(title) = self.title {
            listing.title = title;
        }
        if let Some(description) = self.description {
            listing.description = description;
        }
        if let Some(price) = self.price {
            listing.price = price;
        }
        if let Some(currency) = self.currency {
            listing.currency = currency;
        }
        if let Some(city) = self.location_city {
            listing.location_city = city;
        }
        if let Some(area) = self.location_area {
            listing.location_area = area;
        }
        if self.bedrooms.is_some() {
            listing.bedrooms = self.bedrooms;
        }
        if self.bathrooms.is_some() {
            listing.bathrooms = self.bathrooms;
        }
        if let Some(property_type) = self.property_type {
            listing.property_type = property_type;
        }
        if let Some(purpose) = self.listing_purpose {
            listing.listing_purpose = purpose;
        }
        if let Some(tags) = self.tags {
            listing.tags = tags;
        }
        if let Some(amenities) = self.amenities {
            listing.amenities = amenities;
        }
        if let Some(status) = self.status {
            listing.status = status;
        }
        if let Some(featured) = self.is_featured {
            listing.is_featured = featured;
        }
        if let Some(media) = self.media_items {
            listing.media_items = media;
        }
    }
}

/// Public search filters for approved listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingQuery {
    pub city: Option<String>,
    pub purpose: Option<ListingPurpose>,
    pub property_type: Option<PropertyType>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl ListingQuery {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(city) = &self.city {
            if !listing.location_city.eq_ignore_ascii_case(city) {
                return false;
            }
        }
        if self.purpose.is_some_and(|purpose| purpose != listing.listing_purpose) {
            return false;
        }
        if self
            .property_type
            .is_some_and(|kind| kind != listing.property_type)
        {
            return false;
        }
        if self.min_price.is_some_and(|min| listing.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price > max) {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [
                &listing.title,
                &listing.description,
                &listing.location_area,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Prospective tenant or buyer contact against an approved listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: InquiryId,
    pub listing_id: ListingId,
    pub contact_name: String,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub message: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

fn default_source() -> String {
    "web".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquirySubmission {
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    pub message: String,
    #[serde(default = "default_source")]
    pub source: String,
}

/// Site-wide notice published by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub body: String,
    pub is_active: bool,
    pub audience: String,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

fn default_audience() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementDraft {
    pub title: String,
    pub body: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_audience")]
    pub audience: String,
}

/// External partner registered for lead or listing integrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerIntegration {
    pub id: PartnerId,
    pub name: String,
    pub contact_email: Option<String>,
    pub webhook_url: Option<String>,
    pub integration_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerDraft {
    pub name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub integration_metadata: Option<Value>,
}

/// Per-agent activity counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentMetrics {
    pub listings: usize,
    pub leads: usize,
    pub approved_listings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDashboard {
    pub agent: User,
    pub metrics: AgentMetrics,
}
