use crate::config::Config;
use crate::mime;
use crate::resolve::{resolve, Kind, ResolveError};
use headers::{Allow, CacheControl, ContentLength, HeaderMapExt};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, Uri};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use std::io;
use std::path::Path;
use tokio::fs;

pub async fn respond_to_request(
    req: Request<Incoming>,
    config: &Config,
) -> Response<Full<Bytes>> {
    respond(req.method(), req.uri(), config).await
}

pub async fn respond(method: &Method, uri: &Uri, config: &Config) -> Response<Full<Bytes>> {
    let head = match *method {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            log::warn!("{} {} -> [method not allowed]", method, uri);
            let mut resp = Response::new(Full::default());
            *resp.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
            resp.headers_mut()
                .typed_insert([Method::GET, Method::HEAD].into_iter().collect::<Allow>());
            return resp;
        }
    };

    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let resolved = match resolve(config, path).await {
        Ok(resolved) => resolved,
        Err(e @ ResolveError::NotFound(_)) => {
            log::warn!("{} {} -> [not found]", method, uri);
            return error_response(StatusCode::NOT_FOUND, e.to_string());
        }
        Err(e @ ResolveError::MissingIndex(_)) => {
            log::error!("{} {} -> [no entry document] {}", method, uri, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let contents = match fs::read(&resolved.path).await {
        Ok(contents) => contents,
        Err(e) => return read_failed(method, uri, &resolved.path, &e),
    };

    let content_type = match resolved.kind {
        Kind::File => {
            log::info!("{} {} -> {}", method, uri, resolved.path.display());
            mime::content_type(&resolved.path)
        }
        Kind::Fallback => {
            log::info!("{} {} -> [fallback] {}", method, uri, resolved.path.display());
            "text/html".to_string()
        }
    };

    let len = contents.len() as u64;
    let mut resp = Response::new(if head {
        Full::default()
    } else {
        Full::from(contents)
    });
    let headers = resp.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(mime::OCTET_STREAM)),
    );
    headers.typed_insert(ContentLength(len));
    headers.typed_insert(CacheControl::new().with_no_cache());
    resp
}

fn read_failed(method: &Method, uri: &Uri, path: &Path, e: &io::Error) -> Response<Full<Bytes>> {
    log::error!(
        "{} {} -> [read error] {} : {}",
        method,
        uri,
        path.display(),
        e
    );
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("failed to read {}: {}", uri.path(), e),
    )
}

fn error_response(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::from(message));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Fallback;
    use http::header::CACHE_CONTROL;
    use http_body_util::BodyExt;
    use std::fs;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    const INDEX: &str = "<!DOCTYPE html><html><body>app</body></html>";
    const APP_JS: &str = "import './chunk.js';\nconsole.log('app');\n";

    fn site(files: &[(&str, &str)], fallback: Fallback) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        let config = Config::new(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            dir.path(),
            "index.html".to_string(),
            fallback,
        )
        .unwrap();
        (dir, config)
    }

    async fn get(config: &Config, method: Method, uri: &'static str) -> (Response<()>, Vec<u8>) {
        let resp = respond(&method, &Uri::from_static(uri), config).await;
        let (parts, body) = resp.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes().to_vec();
        (Response::from_parts(parts, ()), bytes)
    }

    fn content_type(resp: &Response<()>) -> &str {
        resp.headers()[CONTENT_TYPE].to_str().unwrap()
    }

    #[tokio::test]
    async fn serves_file_and_falls_back() {
        let (_dir, config) = site(
            &[("index.html", INDEX), ("app.js", APP_JS)],
            Fallback::Extension,
        );

        let (resp, body) = get(&config, Method::GET, "/app.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "application/javascript");
        assert_eq!(body, APP_JS.as_bytes());

        let (resp, body) = get(&config, Method::GET, "/dashboard").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/html");
        assert_eq!(body, INDEX.as_bytes());

        let (resp, _) = get(&config, Method::GET, "/missing.png").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let (resp, body) = get(&config, Method::GET, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body, INDEX.as_bytes());
    }

    #[tokio::test]
    async fn headers_on_success() {
        let (_dir, config) = site(&[("index.html", INDEX)], Fallback::Extension);

        let (resp, _) = get(&config, Method::GET, "/dashboard?tab=2").await;
        assert_eq!(
            resp.headers().typed_get::<ContentLength>(),
            Some(ContentLength(INDEX.len() as u64))
        );
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache");
    }

    #[tokio::test]
    async fn query_is_ignored() {
        let (_dir, config) = site(
            &[("index.html", INDEX), ("app.js", APP_JS)],
            Fallback::Extension,
        );

        let (_, with_query) = get(&config, Method::GET, "/app.js?v=123").await;
        let (_, without) = get(&config, Method::GET, "/app.js").await;
        assert_eq!(with_query, without);
    }

    #[tokio::test]
    async fn binary_files_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), INDEX).unwrap();
        let blob = (0..=255u8).cycle().take(70_000).collect::<Vec<_>>();
        fs::write(dir.path().join("blob.bin"), &blob).unwrap();
        let config = Config::new(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            dir.path(),
            "index.html".to_string(),
            Fallback::Extension,
        )
        .unwrap();

        let (resp, body) = get(&config, Method::GET, "/blob.bin").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "application/octet-stream");
        assert_eq!(body, blob);
    }

    #[tokio::test]
    async fn always_mode_serves_index_for_missing_assets() {
        let (_dir, config) = site(&[("index.html", INDEX)], Fallback::Always);

        let (resp, body) = get(&config, Method::GET, "/missing.png").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/html");
        assert_eq!(body, INDEX.as_bytes());
    }

    #[tokio::test]
    async fn missing_entry_document_is_server_error() {
        let (_dir, config) = site(&[("app.js", APP_JS)], Fallback::Extension);

        let (resp, body) = get(&config, Method::GET, "/dashboard").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(String::from_utf8(body).unwrap().contains("index.html"));

        let (resp, _) = get(&config, Method::GET, "/app.js").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let (resp, _) = get(&config, Method::GET, "/missing.css").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreadable_file_is_server_error() {
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let resp = read_failed(
            &Method::GET,
            &Uri::from_static("/app.js?v=1"),
            Path::new("/srv/app/app.js"),
            &e,
        );

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("/app.js"), "{}", body);
        assert!(body.contains("permission denied"), "{}", body);
    }

    #[tokio::test]
    async fn head_has_headers_but_no_body() {
        let (_dir, config) = site(&[("index.html", INDEX)], Fallback::Extension);

        let (resp, body) = get(&config, Method::HEAD, "/index.html").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().typed_get::<ContentLength>(),
            Some(ContentLength(INDEX.len() as u64))
        );
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn other_methods_not_allowed() {
        let (_dir, config) = site(&[("index.html", INDEX)], Fallback::Extension);

        let (resp, _) = get(&config, Method::POST, "/dashboard").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = resp.headers().typed_get::<Allow>().unwrap();
        assert_eq!(allow.iter().collect::<Vec<_>>(), [Method::GET, Method::HEAD]);
    }

    #[tokio::test]
    async fn traversal_does_not_escape() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("server_config"), "secret").unwrap();
        let root = outer.path().join("app");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("index.html"), INDEX).unwrap();
        let config = Config::new(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            &root,
            "index.html".to_string(),
            Fallback::Extension,
        )
        .unwrap();

        for uri in ["/../server_config", "/%2e%2e/server_config"] {
            let (_, body) = get(&config, Method::GET, uri).await;
            assert_ne!(body, b"secret", "{}", uri);
        }
    }
}
