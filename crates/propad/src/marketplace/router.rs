use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    AnnouncementDraft, InquirySubmission, ListingDraft, ListingId, ListingQuery, ListingUpdate,
    PartnerDraft, RuleId, User, UserId, UserRegistration,
};
use super::error::MarketplaceError;
use super::policy::PolicyRuleDraft;
use super::rewards::PayoutRequest;
use super::service::MarketplaceService;
use super::store::MarketplaceStore;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const ACTOR_HEADER: &str = "x-user-id";

type SharedService<S> = State<Arc<MarketplaceService<S>>>;

/// Router exposing the marketplace API under `/api/v1`.
pub fn marketplace_router<S>(service: Arc<MarketplaceService<S>>) -> Router
where
    S: MarketplaceStore + 'static,
{
    Router::new()
        .route("/api/v1/auth/register", post(register_handler::<S>))
        .route("/api/v1/agents", get(agents_handler::<S>))
        .route("/api/v1/agents/me/dashboard", get(dashboard_handler::<S>))
        .route(
            "/api/v1/listings",
            get(public_listings_handler::<S>).post(create_listing_handler::<S>),
        )
        .route("/api/v1/listings/mine", get(my_listings_handler::<S>))
        .route(
            "/api/v1/listings/:listing_id",
            get(get_listing_handler::<S>).patch(update_listing_handler::<S>),
        )
        .route(
            "/api/v1/inquiries/:listing_id",
            post(create_inquiry_handler::<S>),
        )
        .route("/api/v1/rewards/pool", get(reward_pool_handler::<S>))
        .route(
            "/api/v1/rewards/payouts",
            get(list_payouts_handler::<S>).post(create_payout_handler::<S>),
        )
        .route("/api/v1/policy/check", post(policy_check_handler::<S>))
        .route(
            "/api/v1/admin/listings/pending",
            get(pending_listings_handler::<S>),
        )
        .route(
            "/api/v1/admin/listings/:listing_id/approve",
            post(approve_listing_handler::<S>),
        )
        .route(
            "/api/v1/admin/listings/:listing_id/reject",
            post(reject_listing_handler::<S>),
        )
        .route(
            "/api/v1/admin/policy/rules",
            get(list_rules_handler::<S>).post(create_rule_handler::<S>),
        )
        .route(
            "/api/v1/admin/policy/rules/:rule_id",
            delete(delete_rule_handler::<S>),
        )
        .route("/api/v1/admin/policy/events", get(policy_events_handler::<S>))
        .route(
            "/api/v1/admin/announcements",
            get(list_announcements_handler::<S>).post(create_announcement_handler::<S>),
        )
        .route(
            "/api/v1/admin/partners",
            get(list_partners_handler::<S>).post(register_partner_handler::<S>),
        )
        .route("/api/v1/admin/audit", get(audit_handler::<S>))
        .with_state(service)
}

fn actor_id(headers: &HeaderMap) -> Result<Option<UserId>, MarketplaceError> {
    let Some(value) = headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(|id| Some(UserId(id)))
        .ok_or(MarketplaceError::Unauthenticated)
}

fn authenticated<S>(
    service: &MarketplaceService<S>,
    headers: &HeaderMap,
) -> Result<User, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let id = actor_id(headers)?.ok_or(MarketplaceError::Unauthenticated)?;
    service.actor(id)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckRequest {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PayoutFilter {
    agent_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventWindow {
    limit: Option<usize>,
}

pub(crate) async fn register_handler<S>(
    State(service): SharedService<S>,
    Json(registration): Json<UserRegistration>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let user = service.register_user(registration)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub(crate) async fn agents_handler<S>(
    State(service): SharedService<S>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(service.list_agents()?).into_response())
}

pub(crate) async fn dashboard_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.agent_dashboard(&actor)?).into_response())
}

pub(crate) async fn public_listings_handler<S>(
    State(service): SharedService<S>,
    Query(query): Query<ListingQuery>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(service.list_public_listings(&query)?).into_response())
}

pub(crate) async fn create_listing_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Json(draft): Json<ListingDraft>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let listing = service.create_listing(&actor, draft)?;
    Ok((StatusCode::CREATED, Json(listing)).into_response())
}

pub(crate) async fn my_listings_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.list_my_listings(&actor)?).into_response())
}

pub(crate) async fn get_listing_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Path(listing_id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let viewer = match actor_id(&headers)? {
        Some(id) => Some(service.actor(id)?),
        None => None,
    };
    let listing = service.get_listing(viewer.as_ref(), ListingId(listing_id))?;
    Ok(Json(listing).into_response())
}

pub(crate) async fn update_listing_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Path(listing_id): Path<u64>,
    Json(update): Json<ListingUpdate>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let listing = service.update_listing(&actor, ListingId(listing_id), update)?;
    Ok(Json(listing).into_response())
}

pub(crate) async fn create_inquiry_handler<S>(
    State(service): SharedService<S>,
    Path(listing_id): Path<u64>,
    Json(submission): Json<InquirySubmission>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let inquiry = service.create_inquiry(ListingId(listing_id), submission)?;
    Ok((StatusCode::CREATED, Json(inquiry)).into_response())
}

pub(crate) async fn reward_pool_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.reward_pool(&actor)?).into_response())
}

pub(crate) async fn list_payouts_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Query(filter): Query<PayoutFilter>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.list_payouts(&actor, filter.agent_id)?).into_response())
}

pub(crate) async fn create_payout_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Json(request): Json<PayoutRequest>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let payout = service.create_payout(&actor, request)?;
    Ok((StatusCode::CREATED, Json(payout)).into_response())
}

pub(crate) async fn policy_check_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.check_text(&actor, &request.text)?).into_response())
}

pub(crate) async fn pending_listings_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.pending_listings(&actor)?).into_response())
}

pub(crate) async fn approve_listing_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Path(listing_id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.approve_listing(&actor, ListingId(listing_id))?).into_response())
}

pub(crate) async fn reject_listing_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Path(listing_id): Path<u64>,
    Json(request): Json<RejectRequest>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let listing = service.reject_listing(&actor, ListingId(listing_id), &request.reason)?;
    Ok(Json(listing).into_response())
}

pub(crate) async fn list_rules_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.list_policy_rules(&actor)?).into_response())
}

pub(crate) async fn create_rule_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Json(draft): Json<PolicyRuleDraft>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let rule = service.create_policy_rule(&actor, draft)?;
    Ok((StatusCode::CREATED, Json(rule)).into_response())
}

pub(crate) async fn delete_rule_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Path(rule_id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    service.delete_policy_rule(&actor, RuleId(rule_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn policy_events_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Query(window): Query<EventWindow>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.policy_events(&actor, window.limit)?).into_response())
}

pub(crate) async fn list_announcements_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.list_announcements(&actor)?).into_response())
}

pub(crate) async fn create_announcement_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Json(draft): Json<AnnouncementDraft>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let announcement = service.create_announcement(&actor, draft)?;
    Ok((StatusCode::CREATED, Json(announcement)).into_response())
}

pub(crate) async fn list_partners_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.list_partners(&actor)?).into_response())
}

pub(crate) async fn register_partner_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
    Json(draft): Json<PartnerDraft>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    let partner = service.register_partner(&actor, draft)?;
    Ok((StatusCode::CREATED, Json(partner)).into_response())
}

pub(crate) async fn audit_handler<S>(
    State(service): SharedService<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = authenticated(&service, &headers)?;
    Ok(Json(service.audit_log(&actor)?).into_response())
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = match &self {
            MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketplaceError::PolicyBlocked { .. } | MarketplaceError::InsufficientFunds { .. } => {
                StatusCode::BAD_REQUEST
            }
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketplaceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MarketplaceError::Conflict(_) => StatusCode::CONFLICT,
            MarketplaceError::Store(err) => {
                error!(error = %err, "marketplace store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let payload = match &self {
            MarketplaceError::PolicyBlocked { blocked } => json!({
                "message": self.to_string(),
                "blocked": blocked,
            }),
            MarketplaceError::InsufficientFunds {
                requested,
                available,
            } => json!({
                "error": self.to_string(),
                "requested": requested,
                "available": available,
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(payload)).into_response()
    }
}
