use std::sync::Arc;

use axum::http::HeaderValue;

use crate::auth::Admission;
use crate::baskets::BasketStore;
use crate::chat::ChatRelay;
use crate::contact::Mailer;
use crate::stocks::MarketData;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Admin chat membership, one per process
    pub relay: ChatRelay,
    /// Token verification and admin-domain check for chat joins
    pub admission: Admission,
    /// Contact form delivery
    pub mailer: Arc<dyn Mailer>,
    /// Brokerage market-data client
    pub market: Arc<dyn MarketData>,
    pub baskets: Arc<dyn BasketStore>,
    /// Browser origin allowed by CORS
    pub allowed_origin: HeaderValue,
}
