//! SOAP 1.1 envelope codec (document/literal, wrapped).

use std::collections::{HashMap, HashSet};
use std::fmt;

use roxmltree::{Document, Node};

use crate::types::{OperationDescriptor, Value};

pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const XML_DECL: &str = "<?xml version='1.0' encoding='UTF-8'?>";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultCode {
    /// The request was malformed or named something that does not exist.
    Client,
    /// The request was valid but processing it failed.
    Server,
}

impl FaultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::Client => "Client",
            FaultCode::Server => "Server",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoapFault {
    pub code: FaultCode,
    pub message: String,
}

impl SoapFault {
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Client,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Server,
            message: message.into(),
        }
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "soap:{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for SoapFault {}

/// One decoded request: the body's wrapper element and its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoapCall {
    pub operation: String,
    pub namespace: Option<String>,
    pub params: HashMap<String, String>,
}

pub fn parse_request(body: &str) -> Result<SoapCall, SoapFault> {
    tracing::debug!(envelope = %body, "received SOAP request");

    if body.trim().is_empty() {
        return Err(SoapFault::client("empty request body"));
    }
    let doc = Document::parse(body)
        .map_err(|e| SoapFault::client(format!("malformed XML: {e}")))?;

    let envelope = doc.root_element();
    if !is_soap_element(&envelope, "Envelope") {
        return Err(SoapFault::client(format!(
            "expected a SOAP 1.1 Envelope, found '{}'",
            envelope.tag_name().name()
        )));
    }

    let soap_body = envelope
        .children()
        .find(|n| is_soap_element(n, "Body"))
        .ok_or_else(|| SoapFault::client("SOAP Envelope has no Body"))?;

    let mut wrappers = soap_body.children().filter(Node::is_element);
    let wrapper = wrappers
        .next()
        .ok_or_else(|| SoapFault::client("SOAP Body is empty"))?;
    if wrappers.next().is_some() {
        return Err(SoapFault::client(
            "SOAP Body must contain exactly one operation element",
        ));
    }

    let mut params = HashMap::new();
    let mut seen = HashSet::new();
    for child in wrapper.children().filter(Node::is_element) {
        let name = child.tag_name().name();
        if !seen.insert(name) {
            return Err(SoapFault::client(format!("duplicate parameter '{name}'")));
        }
        if child.attribute((XSI_NS, "nil")) == Some("true") {
            continue;
        }
        let text: String = child
            .descendants()
            .filter(Node::is_text)
            .filter_map(|n| n.text())
            .collect();
        params.insert(name.to_string(), text);
    }

    Ok(SoapCall {
        operation: wrapper.tag_name().name().to_string(),
        namespace: wrapper.tag_name().namespace().map(str::to_string),
        params,
    })
}

fn is_soap_element(node: &Node, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace() == Some(ENVELOPE_NS)
}

pub fn encode_response(namespace: &str, op: &OperationDescriptor, items: &[Value]) -> String {
    let item = op.returns.item_type().xsd_name();
    let mut inner = String::new();
    for value in items {
        inner.push_str(&format!(
            "<tns:{item}>{}</tns:{item}>",
            escape_text(&value.to_string())
        ));
    }
    let envelope = format!(
        "{XML_DECL}<soap:Envelope xmlns:soap=\"{ENVELOPE_NS}\" xmlns:tns=\"{ns}\">\
         <soap:Body><tns:{response}><tns:{result}>{inner}</tns:{result}></tns:{response}>\
         </soap:Body></soap:Envelope>",
        ns = escape_attr(namespace),
        response = op.response_name(),
        result = op.result_name(),
    );
    tracing::debug!(envelope = %envelope, "sending SOAP response");
    envelope
}

pub fn encode_fault(fault: &SoapFault) -> String {
    let envelope = format!(
        "{XML_DECL}<soap:Envelope xmlns:soap=\"{ENVELOPE_NS}\"><soap:Body><soap:Fault>\
         <faultcode>soap:{code}</faultcode><faultstring>{message}</faultstring>\
         </soap:Fault></soap:Body></soap:Envelope>",
        code = fault.code.as_str(),
        message = escape_text(&fault.message),
    );
    tracing::debug!(envelope = %envelope, "sending SOAP fault");
    envelope
}

/// Escape element content. `\r` is written as a character reference so that
/// end-of-line normalisation on the receiving side keeps it.
pub fn escape_text(text: &str) -> String {
    escape(text, false)
}

/// Escape a double- or single-quoted attribute value. Whitespace other than
/// the space character is written as character references, otherwise
/// attribute-value normalisation turns it into spaces.
pub fn escape_attr(text: &str) -> String {
    escape(text, true)
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '"' if attribute => out.push_str("&quot;"),
            '\'' if attribute => out.push_str("&apos;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReturnDescriptor, XsdType};

    fn send_message() -> OperationDescriptor {
        OperationDescriptor::new("send_message", ReturnDescriptor::Array(XsdType::String))
            .param("msg", XsdType::String)
            .param("count", XsdType::Long)
    }

    fn request(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:tns="org.temporary.soap">
  <soapenv:Header/>
  <soapenv:Body>{body}</soapenv:Body>
</soapenv:Envelope>"#
        )
    }

    #[test]
    fn test_parse_request() {
        let xml = request(
            "<tns:send_message><tns:msg>hello &amp; bye</tns:msg><tns:count>3</tns:count></tns:send_message>",
        );
        let call = parse_request(&xml).unwrap();
        assert_eq!(call.operation, "send_message");
        assert_eq!(call.namespace.as_deref(), Some("org.temporary.soap"));
        assert_eq!(call.params["msg"], "hello & bye");
        assert_eq!(call.params["count"], "3");
    }

    #[test]
    fn test_parse_empty_and_nil_params() {
        let xml = request(&format!(
            r#"<send_message xmlns:xsi="{XSI_NS}"><msg/><count xsi:nil="true"/></send_message>"#
        ));
        let call = parse_request(&xml).unwrap();
        assert_eq!(call.params["msg"], "");
        assert!(!call.params.contains_key("count"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let bodies = vec![
            String::new(),
            "   ".to_string(),
            "<not xml".to_string(),
            "<Envelope><Body><send_message/></Body></Envelope>".to_string(),
            format!(r#"<s:Envelope xmlns:s="{ENVELOPE_NS}"/>"#),
            request(""),
            request("<a/><b/>"),
        ];
        for body in &bodies {
            let fault = parse_request(body).unwrap_err();
            assert_eq!(fault.code, FaultCode::Client, "input: {body:?}");
        }
    }

    #[test]
    fn test_encode_response() {
        let xml = encode_response(
            "org.temporary.soap",
            &send_message(),
            &[Value::String("Your message: <hi>".to_string())],
        );
        let doc = Document::parse(&xml).unwrap();
        let items: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name(("org.temporary.soap", "string")))
            .filter_map(|n| n.text())
            .collect();
        assert_eq!(items, vec!["Your message: <hi>"]);
        assert!(
            doc.descendants()
                .any(|n| n.has_tag_name(("org.temporary.soap", "send_messageResult")))
        );
    }

    #[test]
    fn test_encode_fault() {
        let xml = encode_fault(&SoapFault::client("bad \"input\""));
        let doc = Document::parse(&xml).unwrap();
        let fault = doc
            .descendants()
            .find(|n| n.has_tag_name((ENVELOPE_NS, "Fault")))
            .unwrap();
        let text = |name: &str| {
            fault
                .children()
                .find(|n| n.has_tag_name(name))
                .and_then(|n| n.text())
                .unwrap()
                .to_string()
        };
        assert_eq!(text("faultcode"), "soap:Client");
        assert_eq!(text("faultstring"), "bad \"input\"");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_text("a&b<c>\"d\"'e'"), "a&amp;b&lt;c&gt;\"d\"'e'");
        assert_eq!(
            escape_attr("a&b<c>\"d\"'e'"),
            "a&amp;b&lt;c&gt;&quot;d&quot;&apos;e&apos;"
        );
        assert_eq!(escape_text("a\r\n\tb"), "a&#13;\n\tb");
        assert_eq!(escape_attr("a\r\n\tb"), "a&#13;&#10;&#9;b");
    }

    #[test]
    fn test_encode_response_keeps_carriage_return() {
        let xml = encode_response(
            "org.temporary.soap",
            &send_message(),
            &[Value::String("a\rb\r\nc".to_string())],
        );
        let doc = Document::parse(&xml).unwrap();
        let item = doc
            .descendants()
            .find(|n| n.has_tag_name(("org.temporary.soap", "string")))
            .and_then(|n| n.text())
            .unwrap();
        assert_eq!(item, "a\rb\r\nc");
    }

    #[test]
    fn test_parse_rejects_duplicate_params() {
        let xml = request(
            "<tns:send_message><tns:msg>a</tns:msg><tns:msg>b</tns:msg><tns:count>1</tns:count></tns:send_message>",
        );
        let fault = parse_request(&xml).unwrap_err();
        assert_eq!(fault.code, FaultCode::Client);
        assert!(fault.message.contains("duplicate parameter 'msg'"));

        let nil_then_value = request(&format!(
            r#"<send_message xmlns:xsi="{XSI_NS}"><msg>a</msg><count xsi:nil="true"/><count>1</count></send_message>"#
        ));
        assert!(parse_request(&nil_then_value).is_err());
    }
}
