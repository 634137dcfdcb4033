//! Hand-off of the server's cache snapshot to the client through
//! `window.INIT_DATA`.

use serde_json::{Map, Value};

/// Id of the `<script>` element carrying the snapshot.
pub const INIT_DATA_ELEMENT_ID: &str = "tally-init-data";

/// Render `snapshot` as a script that assigns it to `window.INIT_DATA`.
///
/// Returns an empty string for an empty snapshot.
pub fn generate_init_data_script(snapshot: &Map<String, Value>) -> String {
    if snapshot.is_empty() {
        return String::new();
    }

    let json = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_owned());

    // `</script>` inside a JSON string would end the element early
    let json = json.replace("</", "<\\/");

    format!(r#"<script id="{INIT_DATA_ELEMENT_ID}">window.INIT_DATA = {json};</script>"#)
}

/// Get INIT_DATA from the window object as a cache snapshot
#[cfg(target_arch = "wasm32")]
pub fn read_init_data() -> Option<Map<String, Value>> {
    use wasm_bindgen::JsValue;

    let window = web_sys::window()?;
    let init_data = js_sys::Reflect::get(&window, &JsValue::from_str("INIT_DATA")).ok()?;

    if init_data.is_undefined() || init_data.is_null() {
        return None;
    }

    // Convert JsValue to JSON string, then deserialize
    let json_string = js_sys::JSON::stringify(&init_data).ok()?;
    let json_str = json_string.as_string()?;

    serde_json::from_str(&json_str).ok()
}
