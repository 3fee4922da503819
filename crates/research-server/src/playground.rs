//! Minimal static HTML page for manually exercising `/research` and
//! `/ws/progress/{id}` during development, grounded on the teacher's
//! `dashflow-langserve` playground (ambient dev tooling, not a product UI).

use axum::response::Html;

const PLAYGROUND_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>deep research playground</title></head>
<body>
<h1>Deep Research Orchestrator</h1>
<p>POST a query to <code>/research</code> or <code>/deep-research</code>, then open
<code>/ws/progress/&lt;task_id&gt;</code> to watch progress events.</p>
<form id="f">
  <input id="query" placeholder="research query" size="60">
  <button type="submit">Submit</button>
</form>
<pre id="out"></pre>
<script>
document.getElementById('f').addEventListener('submit', async (e) => {
  e.preventDefault();
  const query = document.getElementById('query').value;
  const res = await fetch('/research', {
    method: 'POST',
    headers: {'content-type': 'application/json'},
    body: JSON.stringify({query}),
  });
  const body = await res.json();
  document.getElementById('out').textContent = JSON.stringify(body, null, 2);
  const ws = new WebSocket(`ws://${location.host}/ws/progress/${body.task_id}`);
  ws.onmessage = (ev) => {
    document.getElementById('out').textContent += '\n' + ev.data;
  };
});
</script>
</body>
</html>"#;

/// `GET /`: the playground page.
pub async fn index() -> Html<&'static str> {
    Html(PLAYGROUND_HTML)
}
