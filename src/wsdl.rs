//! WSDL 1.1 rendering of a [`ServiceDescriptor`].

use std::collections::BTreeSet;

use crate::soap::escape_attr;
use crate::types::ServiceDescriptor;

pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

/// Render the interface description as a document/literal WSDL 1.1 document
/// whose single port is bound to `location`.
pub fn render(service: &ServiceDescriptor, location: &str) -> String {
    let tns = escape_attr(&service.namespace);
    let mut out = String::new();

    out.push_str(&format!(
        "<?xml version='1.0' encoding='UTF-8'?>\
         <wsdl:definitions xmlns:wsdl=\"{WSDL_NS}\" xmlns:soap=\"{WSDL_SOAP_NS}\" \
         xmlns:xs=\"{XSD_NS}\" xmlns:tns=\"{tns}\" targetNamespace=\"{tns}\" name=\"{name}\">",
        name = escape_attr(&service.name),
    ));

    render_types(service, &tns, &mut out);

    for op in &service.operations {
        out.push_str(&format!(
            "<wsdl:message name=\"{req}\"><wsdl:part name=\"parameters\" element=\"tns:{req}\"/></wsdl:message>\
             <wsdl:message name=\"{resp}\"><wsdl:part name=\"parameters\" element=\"tns:{resp}\"/></wsdl:message>",
            req = op.name,
            resp = op.response_name(),
        ));
    }

    out.push_str(&format!(
        "<wsdl:portType name=\"{}\">",
        service.port_type_name()
    ));
    for op in &service.operations {
        out.push_str(&format!(
            "<wsdl:operation name=\"{name}\">\
             <wsdl:input name=\"{name}\" message=\"tns:{name}\"/>\
             <wsdl:output name=\"{resp}\" message=\"tns:{resp}\"/></wsdl:operation>",
            name = op.name,
            resp = op.response_name(),
        ));
    }
    out.push_str("</wsdl:portType>");

    out.push_str(&format!(
        "<wsdl:binding name=\"{binding}\" type=\"tns:{port_type}\">\
         <soap:binding style=\"document\" transport=\"{SOAP_HTTP_TRANSPORT}\"/>",
        binding = service.binding_name(),
        port_type = service.port_type_name(),
    ));
    for op in &service.operations {
        out.push_str(&format!(
            "<wsdl:operation name=\"{name}\"><soap:operation soapAction=\"{name}\" style=\"document\"/>\
             <wsdl:input name=\"{name}\"><soap:body use=\"literal\"/></wsdl:input>\
             <wsdl:output name=\"{resp}\"><soap:body use=\"literal\"/></wsdl:output></wsdl:operation>",
            name = op.name,
            resp = op.response_name(),
        ));
    }
    out.push_str("</wsdl:binding>");

    out.push_str(&format!(
        "<wsdl:service name=\"{name}\"><wsdl:port name=\"{port}\" binding=\"tns:{binding}\">\
         <soap:address location=\"{location}\"/></wsdl:port></wsdl:service></wsdl:definitions>",
        name = escape_attr(&service.name),
        port = service.port_name(),
        binding = service.binding_name(),
        location = escape_attr(location),
    ));
    out
}

fn render_types(service: &ServiceDescriptor, tns: &str, out: &mut String) {
    out.push_str(&format!(
        "<wsdl:types><xs:schema targetNamespace=\"{tns}\" elementFormDefault=\"qualified\">"
    ));

    let array_types: BTreeSet<_> = service
        .operations
        .iter()
        .map(|op| op.returns)
        .map(|r| (r.array_type_name(), r.item_type().xsd_name()))
        .collect();
    for (array, item) in &array_types {
        out.push_str(&format!(
            "<xs:complexType name=\"{array}\"><xs:sequence>\
             <xs:element name=\"{item}\" type=\"xs:{item}\" minOccurs=\"0\" maxOccurs=\"unbounded\"/>\
             </xs:sequence></xs:complexType>"
        ));
    }

    for op in &service.operations {
        out.push_str(&format!(
            "<xs:element name=\"{}\"><xs:complexType><xs:sequence>",
            op.name
        ));
        for param in &op.params {
            out.push_str(&format!(
                "<xs:element name=\"{}\" type=\"xs:{}\"/>",
                param.name,
                param.ty.xsd_name()
            ));
        }
        out.push_str("</xs:sequence></xs:complexType></xs:element>");

        out.push_str(&format!(
            "<xs:element name=\"{resp}\"><xs:complexType><xs:sequence>\
             <xs:element name=\"{result}\" type=\"tns:{array}\"/>\
             </xs:sequence></xs:complexType></xs:element>",
            resp = op.response_name(),
            result = op.result_name(),
            array = op.returns.array_type_name(),
        ));
    }

    out.push_str("</xs:schema></wsdl:types>");
}
