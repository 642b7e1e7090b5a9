use base64::{Engine as _, engine::general_purpose::STANDARD};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::aws::AvailableRoles;
use crate::error::{Error, Result};

/// Decode a base64 SAML assertion as returned by Okta and extract the AWS
/// role mappings it grants.
pub fn decode_assertion(raw_saml_assertion: &str) -> Result<AvailableRoles> {
    let response = SamlResponse::from_base64(raw_saml_assertion)?;
    AvailableRoles::from_saml_response(&response)
}

/// Decoded SAML response
#[derive(Debug)]
pub struct SamlResponse {
    decoded_xml: Vec<u8>,
}

impl SamlResponse {
    /// Create from Base64-encoded response. Embedded line breaks are ignored.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let compact: String = encoded.split_ascii_whitespace().collect();
        let decoded = STANDARD
            .decode(compact)
            .map_err(|e| Error::decode(format!("invalid base64: {e}")))?;
        Ok(Self {
            decoded_xml: decoded,
        })
    }

    /// Collect the values of every `Attribute` element named `attribute_name`.
    ///
    /// The whole document is walked, so malformed XML is reported even when
    /// the attribute appears before the error. An empty vector means the
    /// document is well formed but carries no such attribute.
    pub fn get_attribute_values(&self, attribute_name: &str) -> Result<Vec<String>> {
        let mut reader = Reader::from_reader(self.decoded_xml.as_slice());
        reader.config_mut().trim_text(true);

        let mut values = Vec::new();
        let mut in_target_attribute = false;
        let mut depth = 0usize;
        let mut saw_root = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    saw_root = true;
                    if is_attribute_element(e) {
                        in_target_attribute = has_name(e, attribute_name);
                    }
                }
                Ok(Event::Empty(_)) => saw_root = true,
                Ok(Event::Text(e)) => {
                    if depth == 0 {
                        return Err(Error::decode("text outside of the root element"));
                    }
                    if in_target_attribute {
                        let value = e
                            .unescape()
                            .map_err(|e| Error::decode(format!("invalid XML text: {e}")))?;
                        values.push(value.into_owned());
                    }
                }
                Ok(Event::CData(e)) if in_target_attribute => {
                    values.push(String::from_utf8_lossy(&e.into_inner()).trim().to_string());
                }
                Ok(Event::End(ref e)) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::decode("unbalanced closing tag"))?;
                    if e.local_name().as_ref() == b"Attribute" {
                        in_target_attribute = false;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::decode(format!("invalid XML: {e}"))),
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(Error::decode("document has no root element"));
        }
        if depth != 0 {
            return Err(Error::decode("document ended before all elements were closed"));
        }

        Ok(values)
    }
}

// Matches `Attribute`, `saml:Attribute`, `saml2:Attribute`, ...
fn is_attribute_element(e: &BytesStart) -> bool {
    e.local_name().as_ref() == b"Attribute"
}

fn has_name(e: &BytesStart, attribute_name: &str) -> bool {
    e.attributes().filter_map(std::result::Result::ok).any(|attr| {
        attr.key.as_ref() == b"Name" && attr.value.as_ref() == attribute_name.as_bytes()
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::AWS_ROLE_ATTRIBUTE;

    pub(crate) fn assertion_with_roles(values: &[&str]) -> String {
        let values = values
            .iter()
            .map(|v| format!("<saml2:AttributeValue>{v}</saml2:AttributeValue>"))
            .collect::<String>();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol">
  <saml2:Assertion xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
    <saml2:AttributeStatement>
      <saml2:Attribute Name="https://aws.amazon.com/SAML/Attributes/RoleSessionName">
        <saml2:AttributeValue>jane@example.com</saml2:AttributeValue>
      </saml2:Attribute>
      <saml2:Attribute Name="{AWS_ROLE_ATTRIBUTE}">{values}</saml2:Attribute>
    </saml2:AttributeStatement>
  </saml2:Assertion>
</saml2p:Response>"#
        )
    }

    #[test]
    fn test_decode_assertion_single_role() {
        let xml = assertion_with_roles(&[
            "arn:aws:iam::123:saml-provider/X,arn:aws:iam::123:role/Y",
        ]);
        let roles = decode_assertion(&STANDARD.encode(xml)).unwrap();

        let role = roles.assume(None).unwrap();
        assert_eq!(role.principal_arn, "arn:aws:iam::123:saml-provider/X");
        assert_eq!(role.role_arn, "arn:aws:iam::123:role/Y");
    }

    #[test]
    fn test_decode_assertion_rejects_invalid_base64() {
        let err = decode_assertion("not base64 at all!").unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_assertion_rejects_non_xml() {
        let encoded = STANDARD.encode("this is plainly not an XML document");
        let err = decode_assertion(&encoded).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_assertion_rejects_truncated_xml() {
        let encoded = STANDARD.encode("<Response><Assertion><AttributeStatement>");
        let err = decode_assertion(&encoded).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_assertion_missing_role_attribute() {
        let xml = r#"<Response><Assertion><AttributeStatement>
            <Attribute Name="urn:other"><AttributeValue>x</AttributeValue></Attribute>
        </AttributeStatement></Assertion></Response>"#;
        let err = decode_assertion(&STANDARD.encode(xml)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
        assert!(err.to_string().contains(AWS_ROLE_ATTRIBUTE));
    }

    #[test]
    fn test_decode_assertion_rejects_value_without_pair() {
        let xml = assertion_with_roles(&["arn:aws:iam::123:role/Y"]);
        let err = decode_assertion(&STANDARD.encode(xml)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_from_base64_ignores_line_breaks() {
        let xml = assertion_with_roles(&[
            "arn:aws:iam::123:saml-provider/X,arn:aws:iam::123:role/Y",
        ]);
        let encoded = STANDARD.encode(&xml);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");

        let response = SamlResponse::from_base64(&wrapped).unwrap();
        assert_eq!(response.decoded_xml, xml.as_bytes());
    }

    #[test]
    fn test_get_attribute_values_unprefixed() {
        let xml = r#"<Response><Assertion><AttributeStatement>
                <Attribute Name="test-attribute">
                    <AttributeValue>first</AttributeValue>
                    <AttributeValue>second &amp; third</AttributeValue>
                </Attribute>
            </AttributeStatement></Assertion></Response>"#;

        let response = SamlResponse::from_base64(&STANDARD.encode(xml)).unwrap();
        let values = response.get_attribute_values("test-attribute").unwrap();
        assert_eq!(values, vec!["first", "second & third"]);

        let missing = response.get_attribute_values("absent").unwrap();
        assert!(missing.is_empty());
    }
}
