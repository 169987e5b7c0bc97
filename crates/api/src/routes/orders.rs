//! Checkout and order lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::{CheckoutOrchestrator, OrderService, PaymentDecider};
use common::{HistoryEventId, OrderId, OrderItemId, ProductId, UserId};
use domain::{CartLine, Money, Order, OrderHistoryEvent, OrderItem, OrderStatus};
use serde::{Deserialize, Serialize};
use store::CheckoutStore;

use crate::auth::RequireUser;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CheckoutStore> {
    pub checkout: CheckoutOrchestrator<S, Arc<dyn PaymentDecider>>,
    pub orders: OrderService<S>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(alias = "products")]
    pub cart_lines: Vec<CartLineRequest>,
    #[serde(default)]
    pub location: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price the client displayed, e.g. `"10.00"`. Informational only.
    #[serde(default)]
    pub price: Option<String>,
}

impl CartLineRequest {
    fn into_cart_line(self) -> Result<CartLine, ApiError> {
        let line = CartLine::new(self.product_id, self.quantity);
        match self.price {
            Some(price) => {
                let quoted = Money::parse(&price).map_err(|e| ApiError::BadRequest(e.to_string()))?;
                Ok(line.with_quoted_price(quoted))
            }
            None => Ok(line),
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub order_id: OrderId,
    pub total: Money,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub location: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEventResponse {
    pub id: HistoryEventId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            total_price: order.total_price,
            status: order.status,
            location: order.location,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: None,
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.unit_price,
            subtotal: item.subtotal,
            created_at: item.created_at,
        }
    }
}

impl From<OrderHistoryEvent> for HistoryEventResponse {
    fn from(event: OrderHistoryEvent) -> Self {
        Self {
            id: event.id,
            order_id: event.order_id,
            status: event.status,
            changed_at: event.changed_at,
        }
    }
}

// -- Handlers --

/// POST /orders: check out the caller's cart.
#[tracing::instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create<S: CheckoutStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireUser(user): RequireUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let lines = req
        .cart_lines
        .into_iter()
        .map(CartLineRequest::into_cart_line)
        .collect::<Result<Vec<_>, _>>()?;

    let placed = state
        .checkout
        .place_order(user.id, lines, req.location)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            order_id: placed.order_id,
            total: placed.total,
            status: placed.status,
        }),
    ))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: CheckoutStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&user.id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}: one of the caller's orders with its items.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get<S: CheckoutStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let details = state.orders.get_order(&user.id, order_id).await?;

    let mut response = OrderResponse::from(details.order);
    response.items = Some(
        details
            .items
            .into_iter()
            .map(OrderItemResponse::from)
            .collect(),
    );
    Ok(Json(response))
}

/// GET /orders/history/{id}: status history of one of the caller's orders.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn history<S: CheckoutStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEventResponse>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let events = state.orders.order_history(&user.id, order_id).await?;
    Ok(Json(
        events.into_iter().map(HistoryEventResponse::from).collect(),
    ))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
