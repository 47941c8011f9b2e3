use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as HyperBuilder,
};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    cli::StartArgs,
    error::ServiceResult,
    handler::Application,
    services,
};

/// Interface the server binds to. Not configurable.
pub const BIND_HOST: &str = "0.0.0.0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub namespace: String,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> ServiceResult<SocketAddr> {
        Ok(format!("{BIND_HOST}:{}", self.port).parse()?)
    }

    pub fn listen_url(&self) -> String {
        format!("http://{BIND_HOST}:{}", self.port)
    }

    pub fn wsdl_url(&self) -> String {
        format!("{}/?wsdl", self.listen_url())
    }
}

impl From<&StartArgs> for ServerConfig {
    fn from(args: &StartArgs) -> Self {
        Self {
            port: args.port,
            namespace: args.namespace.clone(),
        }
    }
}

/// Bind the configured port and serve until `shutdown` is cancelled.
pub async fn start_server(config: ServerConfig, shutdown: CancellationToken) -> ServiceResult<()> {
    let app = Arc::new(services::application(&config.namespace));
    let listener = TcpListener::bind(config.bind_addr()?).await?;

    println!("listening to {}", config.listen_url());
    println!("wsdl is at: {}", config.wsdl_url());
    tracing::info!(
        port = config.port,
        namespace = %config.namespace,
        operations = app.descriptor().operations.len(),
        "SOAP server started"
    );

    serve(listener, app, shutdown).await
}

/// Accept loop. Each connection runs on its own task; once `shutdown` fires
/// no new connections are accepted and open ones are closed after their
/// current request.
pub async fn serve(
    listener: TcpListener,
    app: Arc<Application>,
    shutdown: CancellationToken,
) -> ServiceResult<()> {
    let fallback_host: Arc<str> = Arc::from(listener.local_addr()?.to_string());
    let mut connections = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("accept error: {e}");
                    continue;
                }
            },
        };
        tracing::debug!(%peer, "connection accepted");

        let app = app.clone();
        let fallback_host = fallback_host.clone();
        let shutdown = shutdown.clone();
        connections.spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let app = app.clone();
                let fallback_host = fallback_host.clone();
                async move { app.handle(req, &fallback_host).await }
            });
            let builder = HyperBuilder::new(TokioExecutor::new());
            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = shutdown.cancelled() => {
                    // finish the in-flight request, then close
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(err) = result {
                tracing::warn!(%peer, "connection error: {err}");
            }
        });

        // reap finished connections so the set does not grow unbounded
        while connections.try_join_next().is_some() {}
    }

    tracing::info!(
        in_flight = connections.len(),
        "shutting down, waiting for open connections"
    );
    while connections.join_next().await.is_some() {}
    tracing::info!("SOAP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn config() -> ServerConfig {
        ServerConfig {
            port: 5000,
            namespace: "org.temporary.soap".to_string(),
        }
    }

    async fn spawn_server() -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<ServiceResult<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Arc::new(services::application("org.temporary.soap"));
        let token = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, app, token.clone()));
        (addr, token, handle)
    }

    async fn roundtrip(addr: SocketAddr, request: String) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_urls() {
        let config = config();
        assert_eq!(config.listen_url(), "http://0.0.0.0:5000");
        assert_eq!(config.wsdl_url(), "http://0.0.0.0:5000/?wsdl");
        assert_eq!(
            config.bind_addr().unwrap(),
            "0.0.0.0:5000".parse::<SocketAddr>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_end_to_end_send_message() {
        let (addr, token, handle) = spawn_server().await;

        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="{}" xmlns:tns="org.temporary.soap"><soapenv:Body><tns:send_message><tns:msg>hello</tns:msg><tns:count>3</tns:count></tns:send_message></soapenv:Body></soapenv:Envelope>"#,
            crate::soap::ENVELOPE_NS
        );
        let request = format!(
            "POST / HTTP/1.1\r\nHost: {addr}\r\nContent-Type: text/xml; charset=utf-8\r\nSOAPAction: \"send_message\"\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let response = roundtrip(addr, request).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("<tns:string>Your message: hello</tns:string>"));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_end_to_end_wsdl() {
        let (addr, token, handle) = spawn_server().await;

        let request = format!("GET /?wsdl HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        let response = roundtrip(addr, request).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        let doc = roxmltree::Document::parse(body).unwrap();
        assert!(doc
            .root_element()
            .has_tag_name((crate::wsdl::WSDL_NS, "definitions")));

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
