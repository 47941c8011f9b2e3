use std::collections::HashMap;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{ALLOW, CONTENT_TYPE, HOST, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};

use crate::soap::{self, FaultCode, SoapFault};
use crate::types::{Arguments, OperationDescriptor, ServiceDescriptor, Value};
use crate::wsdl;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

type OperationFn = dyn Fn(&Arguments) -> Result<Vec<Value>, SoapFault> + Send + Sync;

/// Registered operations and the interface description built from them.
pub struct Application {
    descriptor: ServiceDescriptor,
    handlers: HashMap<String, Box<OperationFn>>,
}

impl Application {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            descriptor: ServiceDescriptor {
                name: name.into(),
                namespace: namespace.into(),
                operations: Vec::new(),
            },
            handlers: HashMap::new(),
        }
    }

    /// Attach `handler` to `operation`. A later registration of the same
    /// name replaces the earlier one.
    pub fn register<F>(mut self, operation: OperationDescriptor, handler: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Vec<Value>, SoapFault> + Send + Sync + 'static,
    {
        self.descriptor
            .operations
            .retain(|op| op.name != operation.name);
        self.handlers
            .insert(operation.name.clone(), Box::new(handler));
        self.descriptor.operations.push(operation);
        self
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn wsdl(&self, location: &str) -> String {
        wsdl::render(&self.descriptor, location)
    }

    /// Decode a request envelope, run the operation and encode its result.
    pub fn call(&self, body: &str) -> Result<String, SoapFault> {
        let call = soap::parse_request(body)?;

        if let Some(ns) = call.namespace.as_deref() {
            if ns != self.descriptor.namespace {
                return Err(SoapFault::client(format!(
                    "unknown namespace '{ns}' for operation '{}'",
                    call.operation
                )));
            }
        }

        let (operation, handler) = self
            .descriptor
            .operation(&call.operation)
            .zip(self.handlers.get(&call.operation))
            .ok_or_else(|| {
                SoapFault::client(format!("unknown operation '{}'", call.operation))
            })?;

        let args = operation
            .decode_arguments(&call.params)
            .map_err(SoapFault::client)?;
        let items = panic::catch_unwind(AssertUnwindSafe(|| handler(&args))).map_err(|_| {
            SoapFault::server(format!("operation '{}' panicked", operation.name))
        })??;

        tracing::info!(operation = %operation.name, items = items.len(), "call completed");
        Ok(soap::encode_response(
            &self.descriptor.namespace,
            operation,
            &items,
        ))
    }

    /// Serve one HTTP request. `fallback_host` is used for the WSDL address
    /// when the request carries no `Host` header.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        fallback_host: &str,
    ) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        tracing::debug!(%method, %path, "request");

        let response = match method {
            Method::GET if wants_wsdl(req.uri().query()) => {
                let host = req
                    .headers()
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or(fallback_host);
                let location = format!("http://{host}{path}");
                xml_response(StatusCode::OK, self.wsdl(&location))
            }
            Method::POST => {
                if let Some(action) = req.headers().get("SOAPAction") {
                    tracing::debug!(soap_action = ?action, "SOAPAction header");
                }
                match read_body(req.into_body()).await {
                    Ok(body) => match self.call(&body) {
                        Ok(envelope) => xml_response(StatusCode::OK, envelope),
                        Err(fault) => fault_response(StatusCode::INTERNAL_SERVER_ERROR, &fault),
                    },
                    Err((status, fault)) => fault_response(status, &fault),
                }
            }
            _ => {
                let mut res = Response::new(Full::new(Bytes::from("Method Not Allowed")));
                *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
                res.headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET, POST"));
                res
            }
        };
        Ok(response)
    }
}

fn wants_wsdl(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .map(|pair| pair.split('=').next().unwrap_or_default())
            .any(|key| key.eq_ignore_ascii_case("wsdl"))
    })
}

async fn read_body<B>(body: B) -> Result<String, (StatusCode, SoapFault)>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    SoapFault::client(format!("request body exceeds {MAX_BODY_BYTES} bytes")),
                )
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    SoapFault::client(format!("failed to read request body: {e}")),
                )
            }
        })?
        .to_bytes();

    String::from_utf8(bytes.to_vec()).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            SoapFault::client(format!("request body is not UTF-8: {e}")),
        )
    })
}

fn xml_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(Bytes::from(body)));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
    res
}

fn fault_response(status: StatusCode, fault: &SoapFault) -> Response<Full<Bytes>> {
    match fault.code {
        FaultCode::Client => tracing::warn!(%fault, "rejecting request"),
        FaultCode::Server => tracing::error!(%fault, "operation failed"),
    }
    xml_response(status, soap::encode_fault(fault))
}
