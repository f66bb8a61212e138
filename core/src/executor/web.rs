//! Declared web service calls
//!
//! Builds `ServiceRequest`s from declared signatures and decomposes a single
//! service response into the declared output parameters.

use super::errors::RuntimeError;
use super::scope::WebSignature;
use super::types::Value;
use crate::services::{ServiceHost, ServiceRequest};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

/// Invoke a declared service through the host
pub fn invoke(
    host: &dyn ServiceHost,
    alias: &str,
    signature: &WebSignature,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    if !signature.params.is_empty() && signature.params.len() != args.len() {
        return Err(RuntimeError::WrongArgCount {
            function: alias.to_string(),
            expected: signature.params.len(),
            got: args.len(),
        });
    }

    let args = args
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            let name = signature
                .params
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("arg{}", i));
            (name, v)
        })
        .collect();

    let request = ServiceRequest {
        service: signature.service.clone(),
        alias: alias.to_string(),
        url: signature.url.clone(),
        args,
    };

    debug!(service = %request.service, alias = %request.alias, "invoking web service");

    host.invoke(&request).map_err(|e| RuntimeError::Service {
        service: signature.service.clone(),
        message: e.to_string(),
    })
}

/// Look up each output parameter in a service response
///
/// XML text responses match on the local tag name of the first element with
/// that name; struct responses match on field name. `None` marks a missing
/// output.
pub fn extract_outputs(response: &Value, outputs: &[String]) -> Vec<Option<Value>> {
    match response {
        Value::Struct(fields) => outputs.iter().map(|o| fields.get(o).cloned()).collect(),
        Value::Str(xml) => {
            let elements = xml_elements(xml);
            outputs
                .iter()
                .map(|o| elements.get(o.as_str()).cloned().map(Value::Str))
                .collect()
        }
        _ => outputs.iter().map(|_| None).collect(),
    }
}

/// Text of every element by local name; the first occurrence in document
/// order wins
fn xml_elements(xml: &str) -> HashMap<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut texts: Vec<String> = Vec::new();
    // Slot of each open element, `None` once its name was already seen
    let mut open: Vec<Option<usize>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                open.push(claim_slot(&mut slots, &mut texts, name));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                claim_slot(&mut slots, &mut texts, name);
            }
            Ok(Event::Text(t)) => {
                if let (Some(Some(slot)), Ok(s)) = (open.last(), t.unescape()) {
                    texts[*slot].push_str(&s);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(Some(slot)) = open.last() {
                    texts[*slot].push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "malformed XML in service response");
                break;
            }
            _ => {}
        }
    }

    slots
        .into_iter()
        .map(|(name, slot)| (name, std::mem::take(&mut texts[slot])))
        .collect()
}

fn claim_slot(
    slots: &mut HashMap<String, usize>,
    texts: &mut Vec<String>,
    name: String,
) -> Option<usize> {
    if slots.contains_key(&name) {
        return None;
    }
    texts.push(String::new());
    slots.insert(name, texts.len() - 1);
    Some(texts.len() - 1)
}
