//! Static landing page

use std::sync::Arc;

use axum::{extract::State, response::Html};

use crate::state::AppState;

/// Landing page linking to the metrics path
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render(&state.config.web.telemetry_path))
}

fn render(metrics_path: &str) -> String {
    format!(
        "<html>
<head><title>Chef Exporter</title></head>
<body>
<h1>Chef Exporter</h1>
<p><a href='{metrics_path}'>Metrics</a></p>
</body>
</html>
"
    )
}
