//! Renders a processed source into the text of a generated module.

use std::path::{Path, PathBuf};

use crate::context::ProcessingContext;
use crate::identity::{absolutize, relative_path, to_slash};
use crate::live::message::change_key;

/// Locations of the runtime entry points the generated module requires.
///
/// Relative paths are taken relative to the session root.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub runtime_module: PathBuf,
    pub live_client: PathBuf,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            runtime_module: PathBuf::from("node_modules/markmod/runtime.js"),
            live_client: PathBuf::from("node_modules/markmod/live-client.js"),
        }
    }
}

/// Require path from the directory of `identity` to `target`.
fn require_path(root: &Path, identity: &str, target: &Path) -> String {
    let file = absolutize(root, Path::new(identity));
    let from = file.parent().unwrap_or(root);
    let relative = to_slash(&relative_path(from, &absolutize(root, target)));
    if relative.starts_with("../") || relative.starts_with("./") {
        relative
    } else {
        format!("./{}", relative)
    }
}

/// Render the generated module for a processed file.
///
/// The module exports a runtime module built from the final source. When
/// `live` is set it also subscribes that module to `change:<uid>` events of
/// the live client.
pub fn emit_module(root: &Path, result: &ProcessingContext, live: bool, options: &EmitOptions) -> String {
    let runtime = js_string(&require_path(root, &result.filename, &options.runtime_module));
    let src = js_string(&result.src);

    let mut out = format!("module.exports = (require({}))({});", runtime, src);

    if live {
        let client = js_string(&require_path(root, &result.filename, &options.live_client));
        let key = js_string(&change_key(&result.filename));
        out.push_str(&format!(
            "\nrequire({}).on({}, function(src) {{ module.exports.update(src)}})",
            client, key
        ));
    }

    out
}

/// serde_json string encoding is a valid JS string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
