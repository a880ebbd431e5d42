//! The chat page served at `/`.

const TEMPLATE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>chorus</title></head>
<body>
<ul id="messages"></ul>
<form id="form"><input id="message" autocomplete="off"><input type="submit" value="Send"></form>
<script>
const scheme = location.protocol === 'https:' ? 'wss' : 'ws';
const sock = new WebSocket(`${scheme}://${location.host}` + __WS_PATH__);
sock.binaryType = 'arraybuffer';
const list = document.getElementById('messages');
const input = document.getElementById('message');
sock.onmessage = (event) => {
  const item = document.createElement('li');
  item.textContent = typeof event.data === 'string'
    ? event.data
    : `[binary ${event.data.byteLength} bytes]`;
  list.appendChild(item);
};
document.getElementById('form').addEventListener('submit', (event) => {
  event.preventDefault();
  if (sock.readyState === WebSocket.OPEN) {
    sock.send(input.value);
    input.value = '';
  }
});
</script>
</body>
</html>
"#;

/// Render the page with its script pointed at `ws_path` on the serving host.
pub fn render(ws_path: &str) -> String {
    // A JSON string is a valid JS string literal.
    let literal = serde_json::to_string(ws_path).unwrap_or_else(|_| "\"/sock\"".to_owned());
    TEMPLATE.replace("__WS_PATH__", &literal)
}
