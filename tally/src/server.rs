//! Development server.
//!
//! Every page request gets a fresh [`Store`]. The page is rendered once to
//! start the fetches it needs, the store is settled, and the page is rendered
//! again with the loaded values. The resulting snapshot is embedded as
//! `INIT_DATA` so the client store starts from the same state.
//!
//! [`Store`] is single-threaded, so [`serve`] must run inside a
//! [`tokio::task::LocalSet`].

use std::io::ErrorKind;
use std::path::{Component, Path};
use std::rc::Rc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::init_data::generate_init_data_script;
use crate::{ROOT_ELEMENT_ID, Scope, Store, View};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Failures that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or accepting on the listener failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn respond_with(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<BoxBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Render `view` into a complete HTML document.
pub async fn render_document<V: View>(store: &Store, view: &V, config: &ServerConfig) -> String {
    let cx = Scope::new(store.clone());

    let _ = view.render(&cx);
    store.settle().await;
    let body = view.render(&cx);

    let init_script = generate_init_data_script(&store.snapshot());
    let title = tally_utils::escape_html(&config.title);
    let bundle = tally_utils::escape_html(&config.bundle);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
{init_script}
</head>
<body>
<div id="{ROOT_ELEMENT_ID}">{body}</div>
<script type="module">import init from "/pkg/{bundle}.js"; init();</script>
</body>
</html>
"#
    )
}

async fn serve_static(dir: &Path, asset: &str) -> Response<BoxBody> {
    let relative = Path::new(asset);
    let is_plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));

    if asset.is_empty() || !is_plain {
        return respond_with(StatusCode::NOT_FOUND, "text/plain", "File not found");
    }

    let file_path = dir.join(relative);
    match tokio::fs::read(&file_path).await {
        Ok(content) => respond_with(StatusCode::OK, content_type(&file_path), content),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            respond_with(StatusCode::NOT_FOUND, "text/plain", "File not found")
        }
        Err(err) => {
            warn!(path = %file_path.display(), error = %err, "failed to read static file");
            respond_with(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                "Error reading file",
            )
        }
    }
}

struct App<F> {
    config: ServerConfig,
    make_view: F,
}

impl<F, V> App<F>
where
    F: Fn() -> V,
    V: View,
{
    async fn handle_request(
        &self,
        req: Request<IncomingBody>,
    ) -> Result<Response<BoxBody>, hyper::Error> {
        Ok(self.respond(req.method(), req.uri().path()).await)
    }

    async fn respond(&self, method: &Method, path: &str) -> Response<BoxBody> {
        debug!(%method, path, "request");

        if *method != Method::GET {
            return respond_with(
                StatusCode::METHOD_NOT_ALLOWED,
                "text/plain",
                "Method Not Allowed",
            );
        }

        if let Some(asset) = path.strip_prefix("/pkg/") {
            return serve_static(&self.config.static_dir, asset).await;
        }

        match path {
            "/" | "/index.html" => {
                let store = Store::new();
                let view = (self.make_view)();
                let document = render_document(&store, &view, &self.config).await;
                respond_with(StatusCode::OK, "text/html; charset=utf-8", document)
            }
            _ => respond_with(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
        }
    }
}

/// Accept connections on `config.addr` until the listener fails.
///
/// `app` builds the page view for each request.
pub async fn serve<V, F>(config: ServerConfig, app: F) -> Result<(), ServerError>
where
    V: View + 'static,
    F: Fn() -> V + 'static,
{
    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, static_dir = %config.static_dir.display(), "server listening");

    let app = Rc::new(App {
        config,
        make_view: app,
    });

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let app = Rc::clone(&app);

        tokio::task::spawn_local(async move {
            let service = service_fn(move |req| {
                let app = Rc::clone(&app);
                async move { app.handle_request(req).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(%peer, error = ?err, "error serving connection");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Html;

    struct Greeting;

    impl View for Greeting {
        fn render(&self, cx: &Scope) -> Html {
            match cx.use_swr::<String, _, _>("name", || async { Some("world".to_owned()) }) {
                Some(name) => Html::raw(format!("<p>Hello, {}</p>", tally_utils::escape_html(&name))),
                None => Html::raw("<p>Loading</p>"),
            }
        }
    }

    fn app(static_dir: &Path) -> App<fn() -> Greeting> {
        App {
            config: ServerConfig::default()
                .static_dir(static_dir)
                .title("Greeting <test>"),
            make_view: || Greeting,
        }
    }

    async fn body_text(response: Response<BoxBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn document_is_rendered_with_loaded_data() {
        let store = Store::new();
        let config = ServerConfig::default().bundle("starter");
        let document = render_document(&store, &Greeting, &config).await;

        assert!(document.contains("<p>Hello, world</p>"));
        assert!(!document.contains("Loading"));
        assert!(document.contains(r#"window.INIT_DATA = {"name":"world"};"#));
        assert!(document.contains(r#"<div id="tally-root">"#));
        assert!(document.contains(r#"import init from "/pkg/starter.js""#));
    }

    #[tokio::test]
    async fn root_serves_page() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path()).respond(&Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let body = body_text(response).await;
        assert!(body.contains("<title>Greeting &lt;test&gt;</title>"));
        assert!(body.contains("Hello, world"));
    }

    #[tokio::test]
    async fn unknown_paths_and_methods_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let missing = app.respond(&Method::GET, "/missing").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let post = app.respond(&Method::POST, "/").await;
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn static_assets_are_served_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client.js"), "export default 1;").unwrap();
        let app = app(dir.path());

        let response = app.respond(&Method::GET, "/pkg/client.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/javascript"
        );
        assert_eq!(body_text(response).await, "export default 1;");

        let absent = app.respond(&Method::GET, "/pkg/client_bg.wasm").await;
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn static_paths_cannot_escape_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let escaped = app.respond(&Method::GET, "/pkg/../Cargo.toml").await;
        assert_eq!(escaped.status(), StatusCode::NOT_FOUND);

        let empty = app.respond(&Method::GET, "/pkg/").await;
        assert_eq!(empty.status(), StatusCode::NOT_FOUND);
    }
}
