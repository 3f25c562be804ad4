use axum::Router;
use http::header::REFERRER_POLICY;
use http::HeaderValue;
use tower::Layer;
use tower_http::set_header::{SetResponseHeader, SetResponseHeaderLayer};
use warehouse_config::Config;

#[allow(clippy::declare_interior_mutable_const)]
pub const ORIGIN_WHEN_CROSS_ORIGIN: HeaderValue =
    HeaderValue::from_static("origin-when-cross-origin");

/// Sets `Referrer-Policy: origin-when-cross-origin` on every response the
/// wrapped service returns, replacing any value it set itself.
#[derive(Clone, Debug)]
pub struct ReferrerPolicyLayer {
    inner: SetResponseHeaderLayer<HeaderValue>,
}

impl ReferrerPolicyLayer {
    /// The configuration does not influence the policy (yet).
    #[must_use]
    pub fn new(_config: &Config) -> Self {
        Self {
            inner: SetResponseHeaderLayer::overriding(REFERRER_POLICY, ORIGIN_WHEN_CROSS_ORIGIN),
        }
    }
}

impl<S> Layer<S> for ReferrerPolicyLayer {
    type Service = SetResponseHeader<S, HeaderValue>;

    fn layer(&self, inner: S) -> Self::Service {
        self.inner.layer(inner)
    }
}

/// Adds the layer to the router's middleware chain.
pub fn includeme<S>(router: Router<S>, config: &Config) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(ReferrerPolicyLayer::new(config))
}
