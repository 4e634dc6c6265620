//! The verdict returned by the decision oracle.

use serde::{Deserialize, Deserializer, Serialize};

use super::page::{ElementDescriptor, find_element};

/// Next action chosen by the decision oracle.
///
/// Serialized as `{"action": "...", "details": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", content = "details", rename_all = "lowercase")]
pub enum Decision {
    Navigate(NavigateDetails),
    Scrape(ReasonDetails),
    Fail(ReasonDetails),
}

/// Target of a navigate decision. At least one of `target_id` and
/// `target_url` is set once the decision has been validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigateDetails {
    #[serde(
        rename = "ai_id",
        alias = "targetId",
        alias = "target_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_id: Option<String>,
    #[serde(
        rename = "url",
        alias = "targetUrl",
        alias = "target_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasonDetails {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Decision {
    pub fn fail(reason: impl Into<String>) -> Self {
        Decision::Fail(ReasonDetails {
            reason: reason.into(),
        })
    }

    pub fn scrape(reason: impl Into<String>) -> Self {
        Decision::Scrape(ReasonDetails {
            reason: reason.into(),
        })
    }

    pub fn navigate_to_element(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Decision::Navigate(NavigateDetails {
            target_id: Some(id.into()),
            target_url: None,
            reason: reason.into(),
        })
    }

    pub fn navigate_to_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Decision::Navigate(NavigateDetails {
            target_id: None,
            target_url: Some(url.into()),
            reason: reason.into(),
        })
    }

    pub fn action(&self) -> &'static str {
        match self {
            Decision::Navigate(_) => "navigate",
            Decision::Scrape(_) => "scrape",
            Decision::Fail(_) => "fail",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::Navigate(details) => &details.reason,
            Decision::Scrape(details) | Decision::Fail(details) => &details.reason,
        }
    }

    /// Check a decision against the elements it was chosen from.
    ///
    /// A navigate decision with neither a target id nor a target url, or whose
    /// id is unknown and which carries no url, is downgraded to `fail`.
    pub fn validated(self, elements: &[ElementDescriptor]) -> Decision {
        let Decision::Navigate(details) = self else {
            return self;
        };

        let target_id = details.target_id.as_deref().filter(|id| !id.trim().is_empty());
        let target_url = details.target_url.as_deref().filter(|url| !url.trim().is_empty());

        match (target_id, target_url) {
            (None, None) => Decision::fail("navigate decision names neither an element nor a url"),
            (Some(id), None) if find_element(elements, id).is_none() => {
                Decision::fail(format!("navigate decision references unknown element {id}"))
            }
            _ => Decision::Navigate(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_wire_shape_with_camel_case_aliases() {
        let decision: Decision = serde_json::from_value(json!({
            "action": "navigate",
            "details": {"targetId": "ai-id-2", "reason": "contact page"}
        }))
        .expect("parse");
        assert_eq!(
            decision,
            Decision::navigate_to_element("ai-id-2", "contact page")
        );
    }

    #[test]
    fn serializes_navigate_with_wire_names() {
        let value = serde_json::to_value(Decision::navigate_to_url("/about", "about"))
            .expect("serialize");
        assert_eq!(
            value,
            json!({"action": "navigate", "details": {"url": "/about", "reason": "about"}})
        );
    }

    #[test]
    fn unknown_action_is_rejected_by_serde() {
        let parsed: Result<Decision, _> =
            serde_json::from_value(json!({"action": "click", "details": {"reason": "x"}}));
        assert!(parsed.is_err());
    }

    #[test]
    fn validation_downgrades_unknown_targets() {
        let elements = vec![ElementDescriptor::new("ai-id-0", "a")];

        let known = Decision::navigate_to_element("ai-id-0", "go").validated(&elements);
        assert_eq!(known.action(), "navigate");

        let unknown = Decision::navigate_to_element("ai-id-7", "go").validated(&elements);
        assert_eq!(unknown.action(), "fail");
        assert!(unknown.reason().contains("ai-id-7"));

        let with_url = Decision::Navigate(NavigateDetails {
            target_id: Some("ai-id-7".into()),
            target_url: Some("https://example.com/x".into()),
            reason: "go".into(),
        })
        .validated(&elements);
        assert_eq!(with_url.action(), "navigate");

        let empty = Decision::Navigate(NavigateDetails::default()).validated(&elements);
        assert_eq!(empty.action(), "fail");
    }

    #[test]
    fn scrape_and_fail_pass_through_validation() {
        assert_eq!(Decision::scrape("here").validated(&[]), Decision::scrape("here"));
        assert_eq!(Decision::fail("nope").validated(&[]), Decision::fail("nope"));
    }
}
