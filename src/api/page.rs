use minijinja::{context, Environment};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const INDEX_TEMPLATE: &str = "index.html";
const PAGE_TITLE: &str = "Companion Chat";

const BUILTIN_INDEX: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{{ title }}</title></head>
<body>
<h1>{{ title }}</h1>
{% if not model_available %}<p><em>Running with canned replies.</em></p>{% endif %}
<div id="log"></div>
<form id="f"><input id="m" autocomplete="off"><button>Send</button></form>
<script>
document.getElementById('f').onsubmit = async (e) => {
  e.preventDefault();
  const m = document.getElementById('m');
  const res = await fetch('/chat', {method: 'POST', headers: {'Content-Type': 'application/json'}, body: JSON.stringify({message: m.value})});
  const data = await res.json();
  const p = document.createElement('p');
  p.textContent = data.response;
  document.getElementById('log').appendChild(p);
  m.value = '';
};
</script>
</body>
</html>
"#;

/// The chat UI page, compiled once at startup.
pub struct HomePage {
    env: Environment<'static>,
}

impl HomePage {
    /// Uses `index.html` from `template_dir` when present, otherwise a
    /// minimal built-in page.
    pub fn load(template_dir: &Path) -> Self {
        let path = template_dir.join(INDEX_TEMPLATE);
        let source: &'static str = match fs::read_to_string(&path) {
            Ok(raw) => {
                info!(path = %path.display(), "loaded chat page template");
                Box::leak(raw.into_boxed_str())
            }
            Err(err) => {
                warn!(path = %path.display(), "chat page template unavailable ({err}), using built-in page");
                BUILTIN_INDEX
            }
        };

        let mut env = Environment::new();
        if let Err(err) = env.add_template(INDEX_TEMPLATE, source) {
            warn!("chat page template failed to compile ({err}), using built-in page");
            env = Environment::new();
            let _ = env.add_template(INDEX_TEMPLATE, BUILTIN_INDEX);
        }
        Self { env }
    }

    pub fn builtin() -> Self {
        let mut env = Environment::new();
        let _ = env.add_template(INDEX_TEMPLATE, BUILTIN_INDEX);
        Self { env }
    }

    pub fn render(&self, model_available: bool) -> Result<String, minijinja::Error> {
        self.env
            .get_template(INDEX_TEMPLATE)?
            .render(context! { title => PAGE_TITLE, model_available => model_available })
    }
}
