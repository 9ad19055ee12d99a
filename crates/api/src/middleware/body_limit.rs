use tower_http::limit::RequestBodyLimitLayer;

/// Reject request bodies larger than `limit` bytes with 413.
pub fn body_limit_layer(limit: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(limit)
}
