//! SOAP 1.1 RPC plumbing for the Debbugs and Mantis adapters: envelope
//! construction and response classification into result, empty, or fault.

use quick_xml::escape::escape;

use crate::http_transport::HttpTransport;
use crate::tracker_error::TrackerError;
use crate::xml_tree::{parse_xml_document, XmlNode, XmlTreeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapParam {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapOutcome {
    /// The element carrying the call's return value.
    Value(XmlNode),
    /// The call succeeded but returned nothing (missing, nil, or empty).
    Empty,
    Fault(String),
}

pub fn build_soap_envelope(namespace: &str, method: &str, params: &[(&str, SoapParam)]) -> String {
    let mut body = String::new();
    for (name, value) in params {
        let (xsi_type, rendered) = match value {
            SoapParam::Int(number) => ("xsd:int", number.to_string()),
            SoapParam::Str(text) => ("xsd:string", escape(text.as_str()).into_owned()),
        };
        body.push_str(&format!(
            "<{name} xsi:type=\"{xsi_type}\">{rendered}</{name}>"
        ));
    }
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\" ",
            "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ",
            "xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" ",
            "soap:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">",
            "<soap:Body><ns1:{method} xmlns:ns1=\"{namespace}\">{body}</ns1:{method}>",
            "</soap:Body></soap:Envelope>"
        ),
        method = method,
        namespace = namespace,
        body = body
    )
}

pub fn parse_soap_response(raw: &str, method: &str) -> Result<SoapOutcome, XmlTreeError> {
    let envelope = parse_xml_document(raw)?;
    if let Some(fault) = envelope.find("Fault") {
        let message = fault
            .child_text("faultstring")
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "unspecified soap fault".to_string());
        return Ok(SoapOutcome::Fault(message));
    }
    let response_name = format!("{method}Response");
    let Some(response) = envelope.find(&response_name) else {
        return Ok(SoapOutcome::Empty);
    };
    let Some(value) = response.children.first() else {
        return Ok(SoapOutcome::Empty);
    };
    if value.attribute("nil") == Some("true") || !value.has_content() {
        return Ok(SoapOutcome::Empty);
    }
    Ok(SoapOutcome::Value(value.clone()))
}

/// Posts one RPC call and classifies the reply. Faults usually arrive with
/// HTTP 500, so the body is inspected before the status.
pub(crate) async fn call_soap_method(
    http: &HttpTransport,
    description: &str,
    endpoint: &str,
    namespace: &str,
    method: &str,
    params: &[(&str, SoapParam)],
) -> Result<SoapOutcome, TrackerError> {
    let envelope = build_soap_envelope(namespace, method, params);
    let soap_action = format!("{namespace}#{method}");
    let response = http
        .post_soap(endpoint, &soap_action, &envelope)
        .await
        .map_err(|error| TrackerError::protocol(description, error, endpoint))?;
    match parse_soap_response(&response.body, method) {
        Ok(outcome) => Ok(outcome),
        Err(_) if !response.is_success() => Err(TrackerError::protocol(
            description,
            format!("HTTP status {}", response.status),
            endpoint,
        )),
        Err(error) => Err(TrackerError::protocol(description, error, endpoint)),
    }
}
