//! OpenAPI specification served by Swagger UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TLX Ads API",
        version = "0.1.0",
        description = "Multi-tenant ads and CRM backend.\n\nPublic tracking endpoints (redirects, impression pixel, conversions) and operator job triggers.",
    ),
    tags(
        (name = "Operations", description = "Health probe"),
        (name = "Tracking", description = "Short-link redirects, impression pixel and conversions"),
        (name = "Jobs", description = "Delivery worker passes, guarded by X-Admin-Key"),
    ),
    paths(
        // Operations
        crate::rest::health_check,
        // Tracking
        crate::rest::handle_redirect,
        crate::rest::handle_pixel,
        crate::rest::handle_conversion,
        // Jobs
        crate::jobs::handle_run_due,
        crate::jobs::handle_process_deliveries,
    ),
    components(schemas(
        crate::rest::HealthResponse,
        crate::rest::OkResponse,
        tlx_management::ErrorResponse,
        tlx_delivery::ProcessReport,
        tlx_delivery::RunDueReport,
    ))
)]
pub struct ApiDoc;
