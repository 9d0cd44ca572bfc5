use std::sync::Once;

use precis_common::observability::{init_logging, LogConfig, LogFormat};

static TRACING: Once = Once::new();

/// Route test logs to stderr and a temp-dir file. `PRECIS_LOG_FORMAT=json`
/// switches the encoding.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let format = match std::env::var("PRECIS_LOG_FORMAT").as_deref().map(str::trim) {
            Ok(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let _ = init_logging(LogConfig {
            app_name: "precis-llm-tests".to_string(),
            log_dir: Some(std::env::temp_dir().join("precis-tests")),
            emit_stderr: true,
            format,
            default_filter: "precis_llm=debug,precis_http=debug".to_string(),
        });
    });
}
