fn feature_enabled(feature: &str) -> bool {
    std::env::var(format!("CARGO_FEATURE_{feature}")).is_ok()
}

/// The TLS backend, if any. Both backends at once is a build error.
fn tls_backend() -> Option<&'static str> {
    match (feature_enabled("TLS_RUSTLS"), feature_enabled("TLS_NATIVE")) {
        (true, true) => panic!("Features 'tls-rustls' and 'tls-native' are mutually exclusive"),
        (true, false) => Some("rustls"),
        (false, true) => Some("native"),
        (false, false) => None,
    }
}

fn main() {
    let tls = tls_backend();
    if tls.is_none() {
        if feature_enabled("SENTRY") {
            panic!("The 'sentry' feature needs a TLS backend ('tls-rustls' or 'tls-native')");
        }
        println!("cargo:warning=Built without TLS, the completion API and messaging gateway will be unreachable over HTTPS");
    }

    // e.g. 0.1.0+rustls.sentry
    let tags: Vec<&str> = tls
        .into_iter()
        .chain(feature_enabled("SENTRY").then_some("sentry"))
        .chain(feature_enabled("OPENAPI").then_some("openapi"))
        .collect();

    let version = match tags.as_slice() {
        [] => env!("CARGO_PKG_VERSION").to_string(),
        tags => format!("{}+{}", env!("CARGO_PKG_VERSION"), tags.join(".")),
    };
    println!("cargo:rustc-env=VERSION={version}");

    println!("cargo:rerun-if-changed=build.rs");
}
