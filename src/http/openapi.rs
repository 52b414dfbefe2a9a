use crate::http::routes::*;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::{ContentBuilder, RefOr, Response};
use utoipa::Modify;

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Persona Relay",
    ),
    tags(
        (name = "Webhook", description = "Inbound messaging gateway callbacks"),
        (name = "System", description = "System configuration and status")
    ),
    paths(
        webhook,
        sys_version,
        sys_set_log_level,
    ),
    modifiers(&OpenApiModifier)
)]
pub struct ApiDoc;

struct OpenApiModifier;
impl Modify for OpenApiModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info = utoipa::openapi::InfoBuilder::new()
            .title("Persona Relay")
            .version(crate::VERSION)
            .description(Some(env!("CARGO_PKG_DESCRIPTION")))
            .license(Some(
                utoipa::openapi::LicenseBuilder::new()
                    .name(env!("CARGO_PKG_LICENSE"))
                    .url(Some(format!(
                        "https://spdx.org/licenses/{}.html",
                        env!("CARGO_PKG_LICENSE")
                    )))
                    .build(),
            ))
            .build();

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }

        // System routes share the same error responses.
        let error_responses = [
            ("400", "Bad request"),
            ("401", "Unauthorized"),
            ("500", "Internal server error"),
        ];
        for (route, path_item) in openapi.paths.paths.iter_mut() {
            if !route.starts_with("/sys/") {
                continue;
            }

            for op in [&mut path_item.get, &mut path_item.post]
                .into_iter()
                .flatten()
            {
                for (status, desc) in error_responses {
                    op.responses
                        .responses
                        .entry(status.to_string())
                        .or_insert_with(|| {
                            let content = ContentBuilder::new()
                                .example(Some(serde_json::json!({
                                    "success": false,
                                    "error": desc
                                })))
                                .build();

                            RefOr::T(
                                Response::builder()
                                    .description(desc)
                                    .content("application/json", content)
                                    .build(),
                            )
                        });
                }
            }
        }
    }
}
