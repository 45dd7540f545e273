/// Template renderer (C2)
use crate::error::ProcessingError;

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, ctx: &serde_json::Value) -> Result<String, ProcessingError>;
}

/// Renders HTML email bodies from templates loaded once, at construction,
/// from a fixed on-disk directory. HTML autoescaping is left on (Tera's
/// default), matching the original implementation's
/// `jinja2.select_autoescape(['html', 'xml'])`.
pub struct TeraRenderer {
    tera: tera::Tera,
}

impl TeraRenderer {
    pub fn new(templates_dir: &str) -> Result<Self, ProcessingError> {
        let glob = format!("{}/**/*.html", templates_dir.trim_end_matches('/'));
        let tera = tera::Tera::new(&glob)
            .map_err(|e| ProcessingError::Config(format!("failed to load templates: {e}")))?;
        Ok(Self { tera })
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, name: &str, ctx: &serde_json::Value) -> Result<String, ProcessingError> {
        let context = tera::Context::from_value(ctx.clone())
            .map_err(|e| ProcessingError::TemplateRenderError(e.to_string()))?;

        self.tera.render(name, &context).map_err(|e| {
            if matches!(e.kind, tera::ErrorKind::TemplateNotFound(_)) {
                ProcessingError::TemplateNotFound(name.to_string())
            } else {
                ProcessingError::TemplateRenderError(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer_over(dir: &std::path::Path) -> TeraRenderer {
        TeraRenderer::new(dir.to_str().unwrap()).unwrap()
    }

    #[test]
    fn renders_template_with_context() {
        let dir = tempdir();
        std::fs::write(dir.path().join("hello.html"), "Hi {{ name }}!").unwrap();
        let renderer = renderer_over(dir.path());
        let out = renderer.render("hello.html", &json!({"name": "Jane"})).unwrap();
        assert_eq!(out, "Hi Jane!");
    }

    #[test]
    fn missing_template_is_terminal() {
        let dir = tempdir();
        std::fs::write(dir.path().join("placeholder.html"), "x").unwrap();
        let renderer = renderer_over(dir.path());
        let err = renderer.render("missing.html", &json!({})).unwrap_err();
        assert!(matches!(err, ProcessingError::TemplateNotFound(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn autoescapes_html_context_values() {
        let dir = tempdir();
        std::fs::write(dir.path().join("escape.html"), "{{ name }}").unwrap();
        let renderer = renderer_over(dir.path());
        let out = renderer
            .render("escape.html", &json!({"name": "<script>"}))
            .unwrap();
        assert!(!out.contains("<script>"));
    }

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }
}
