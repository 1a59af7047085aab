use serde_json::{Map, Value};

use crate::api::ParserError;
use crate::envelope::ValidatedMessage;

/// Attribute holding the JSON-encoded HTTP headers of the original webhook call.
pub const HEADERS_ATTRIBUTE: &str = "headers";
/// Request id header set by the tcWebHooks TeamCity plugin on every delivery.
pub const TEAMCITY_MARKER_HEADER: &str = "X-Tcwebhooks-Request-Id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    TeamcityBuild,
}

/// Decide whether a message is a TeamCity build event.
///
/// Messages without a `headers` attribute, or whose headers lack the TeamCity
/// marker, are unrelated traffic on the same topic: they yield `Ok(None)`.
pub fn classify(message: &ValidatedMessage) -> Result<Option<EventClass>, ParserError> {
    let Some(raw_headers) = message.attributes.get(HEADERS_ATTRIBUTE) else {
        return Ok(None);
    };

    let headers: Map<String, Value> =
        serde_json::from_str(raw_headers).map_err(ParserError::InvalidHeaders)?;

    let is_teamcity = headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case(TEAMCITY_MARKER_HEADER));

    Ok(is_teamcity.then_some(EventClass::TeamcityBuild))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn message_with(attributes: &[(&str, &str)]) -> ValidatedMessage {
        ValidatedMessage {
            raw: json!({}),
            data: None,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            message_id: None,
            publish_time: None,
        }
    }

    #[test]
    fn no_headers_is_not_applicable() {
        let message = message_with(&[("source", "github")]);

        assert_eq!(classify(&message).unwrap(), None);
    }

    #[test]
    fn headers_without_marker_are_not_applicable() {
        let message = message_with(&[(
            "headers",
            r#"{"X-Github-Event": "push", "Content-Type": "application/json"}"#,
        )]);

        assert_eq!(classify(&message).unwrap(), None);
    }

    #[test]
    fn marker_header_is_a_build_event() {
        let message = message_with(&[(
            "headers",
            r#"{"X-Tcwebhooks-Request-Id": "8e5f6c1d", "Content-Type": "application/json"}"#,
        )]);

        assert_eq!(
            classify(&message).unwrap(),
            Some(EventClass::TeamcityBuild)
        );
    }

    #[test]
    fn marker_header_ignores_case() {
        let message = message_with(&[("headers", r#"{"x-tcwebhooks-request-id": "8e5f6c1d"}"#)]);

        assert_eq!(
            classify(&message).unwrap(),
            Some(EventClass::TeamcityBuild)
        );
    }

    #[test]
    fn unparseable_headers_are_invalid() {
        for headers in ["{not json", r#"["X-Tcwebhooks-Request-Id"]"#] {
            let message = message_with(&[("headers", headers)]);

            assert!(
                matches!(classify(&message), Err(ParserError::InvalidHeaders(_))),
                "{headers}"
            );
        }
    }
}
