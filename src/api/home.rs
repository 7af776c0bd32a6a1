//! HTML home page served at `/`.

use crate::config::Config;

/// Render the home page with service name, version and a link to the docs.
pub fn render_home_page(config: &Config) -> String {
    let docs_path = format!("{}/docs", config.root_path());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{name} - v{version}</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            margin: 0;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            text-align: center;
            color: white;
            background: linear-gradient(135deg, #1a1a2e 0%, #2c3e50 50%, #4a5568 100%);
        }}
        .container {{
            background: rgba(255, 255, 255, 0.1);
            border-radius: 20px;
            padding: 2rem;
            max-width: 800px;
            margin: 1rem;
        }}
        .version {{
            background: rgba(255, 255, 255, 0.2);
            padding: 0.4rem 0.8rem;
            border-radius: 25px;
            display: inline-block;
            font-weight: bold;
        }}
        a {{
            color: white;
            background: rgba(74, 144, 226, 0.3);
            text-decoration: none;
            padding: 0.7rem 1.5rem;
            border-radius: 25px;
            display: inline-block;
            margin: 1rem 0;
        }}
        .footer {{ font-size: 0.85rem; opacity: 0.7; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{name}</h1>
        <div class="version">Version {version}</div>
        <div><a href="{docs_path}">API Documentation</a></div>
        <p>{description}</p>
        <div class="footer">Environment: {environment} | OpenTelemetry enabled</div>
    </div>
</body>
</html>
"#,
        name = crate::API_NAME,
        version = crate::VERSION,
        description = crate::DESCRIPTION,
        environment = config.app_environment,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_page_links_docs_under_root_path() {
        let config = Config::from_vars([("API_ROOT_PATH", "/proxy/")]).unwrap();
        let html = render_home_page(&config);

        assert!(html.contains(r#"href="/proxy/docs""#));
        assert!(html.contains(crate::VERSION));
        assert!(html.contains("Environment: local"));
    }
}
