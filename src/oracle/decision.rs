use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::llm::prompts::{build_decide_system_prompt, build_decide_user_message};
use crate::llm::{ChatCompletionProvider, LlmClient};
use crate::logging::WayfinderLogger;
use crate::metrics::OracleFunction;
use crate::types::{Decision, ElementDescriptor};

use super::{OracleSettings, parse_json_reply};

const LOG_CATEGORY: &str = "decide";

/// Asks the reasoning backend for the next navigation step.
pub struct DecisionOracle<P: ChatCompletionProvider> {
    llm: Arc<LlmClient<P>>,
    settings: OracleSettings,
    logger: Arc<WayfinderLogger>,
}

impl<P: ChatCompletionProvider> DecisionOracle<P> {
    pub fn new(
        llm: Arc<LlmClient<P>>,
        settings: OracleSettings,
        logger: Arc<WayfinderLogger>,
    ) -> Self {
        Self {
            llm,
            settings,
            logger,
        }
    }

    /// Choose the next action for `goal` on the page at `current_url`.
    ///
    /// Never fails: backend errors, unparsable replies and inconsistent
    /// targets all come back as [`Decision::Fail`].
    pub async fn decide(
        &self,
        goal: &str,
        current_url: &str,
        elements: &[ElementDescriptor],
    ) -> Decision {
        self.logger.info(
            format!("requesting next action for goal: {goal}"),
            Some(LOG_CATEGORY),
            Some(json!({ "url": current_url, "elements": elements.len() })),
        );

        let system_prompt = build_decide_system_prompt(self.settings.user_instructions.as_deref());
        let user_message = build_decide_user_message(goal, current_url, elements);

        let reply = match self
            .llm
            .complete_text(
                &system_prompt,
                &user_message,
                self.settings.completion_options(),
                Some(OracleFunction::Decide.as_str()),
            )
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                self.logger
                    .error(format!("reasoning backend failed: {err}"), Some(LOG_CATEGORY), None);
                return Decision::fail(format!("reasoning backend error: {err}"));
            }
        };

        let decision = match parse_decision(&reply) {
            Ok(decision) => decision.validated(elements),
            Err(reason) => {
                self.logger.error(reason.clone(), Some(LOG_CATEGORY), None);
                Decision::fail(reason)
            }
        };

        self.logger.info(
            format!("decided to {}", decision.action()),
            Some(LOG_CATEGORY),
            Some(serde_json::to_value(&decision).unwrap_or(Value::Null)),
        );
        decision
    }
}

/// Parse a raw backend reply into a [`Decision`].
///
/// Fences are stripped, the action name is matched case-insensitively and a
/// missing `details` object is treated as empty. The error string describes
/// why the reply was rejected.
pub fn parse_decision(reply: &str) -> Result<Decision, String> {
    let value = parse_json_reply(reply)
        .map_err(|err| format!("reasoning backend returned invalid JSON: {err}"))?;

    let Value::Object(mut object) = value else {
        return Err("reasoning backend reply is not a JSON object".to_string());
    };

    let action = object
        .get("action")
        .and_then(Value::as_str)
        .map(|action| action.trim().to_ascii_lowercase())
        .ok_or_else(|| "reasoning backend reply has no action".to_string())?;
    object.insert("action".to_string(), Value::String(action));

    match object.get("details") {
        None | Some(Value::Null) => {
            object.insert("details".to_string(), Value::Object(Map::new()));
        }
        Some(Value::Object(_)) => {}
        Some(_) => return Err("reasoning backend reply details is not an object".to_string()),
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|err| format!("reasoning backend reply does not match the decision schema: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use crate::oracle::test_support::ScriptedProvider;
    use crate::types::NavigateDetails;

    fn oracle(provider: ScriptedProvider) -> DecisionOracle<ScriptedProvider> {
        DecisionOracle::new(
            Arc::new(LlmClient::new("gemini-1.5-flash", provider)),
            OracleSettings {
                json_mode: true,
                user_instructions: None,
            },
            Arc::new(WayfinderLogger::new(Verbosity::Minimal)),
        )
    }

    fn elements() -> Vec<ElementDescriptor> {
        vec![
            ElementDescriptor::new("ai-id-0", "a")
                .with_text("Contact")
                .with_href("https://example.com/contact"),
            ElementDescriptor::new("ai-id-1", "button").with_text("Subscribe"),
        ]
    }

    #[tokio::test]
    async fn fenced_navigate_reply_is_parsed() {
        let reply = "```json\n{\"action\":\"navigate\",\"details\":{\"ai_id\":\"ai-id-0\",\"url\":\"https://example.com/contact\",\"reason\":\"contact info\"}}\n```";
        let decision = oracle(ScriptedProvider::replying(&[reply]))
            .decide("find the contact email", "https://example.com", &elements())
            .await;
        assert_eq!(
            decision,
            Decision::Navigate(NavigateDetails {
                target_id: Some("ai-id-0".into()),
                target_url: Some("https://example.com/contact".into()),
                reason: "contact info".into(),
            })
        );
    }

    #[tokio::test]
    async fn request_embeds_goal_and_elements() {
        let provider = ScriptedProvider::replying(&[r#"{"action":"scrape","details":{"reason":"here"}}"#]);
        let oracle = oracle(provider);
        oracle
            .decide("find pricing", "https://example.com/p", &elements())
            .await;

        let message = oracle.llm.provider().user_message(0).await;
        assert!(message.contains("find pricing"));
        assert!(message.contains("https://example.com/p"));
        assert!(message.contains("ai-id-1"));
    }

    #[tokio::test]
    async fn garbage_replies_become_fail_decisions() {
        let replies = [
            "Sure! I think you should click the contact link.",
            "[1, 2, 3]",
            r#"{"details": {"reason": "no action"}}"#,
            r#"{"action": "click", "details": {"reason": "x"}}"#,
            r#"{"action": "navigate", "details": "ai-id-0"}"#,
            r#"{"action": "navigate", "details": {"reason": "no target"}}"#,
            r#"{"action": "navigate", "details": {"ai_id": "ai-id-42", "reason": "ghost"}}"#,
            "",
        ];

        for reply in replies {
            let decision = oracle(ScriptedProvider::replying(&[reply]))
                .decide("goal", "https://example.com", &elements())
                .await;
            assert_eq!(decision.action(), "fail", "reply {reply:?} should fail");
            assert!(!decision.reason().is_empty());
        }
    }

    #[tokio::test]
    async fn backend_error_becomes_fail_decision() {
        let decision = oracle(ScriptedProvider::failing("quota exceeded"))
            .decide("goal", "https://example.com", &elements())
            .await;
        assert_eq!(decision.action(), "fail");
        assert!(decision.reason().contains("quota exceeded"));
    }

    #[test]
    fn lenient_parsing_accepts_case_and_missing_details() {
        assert_eq!(
            parse_decision(r#"{"action": "SCRAPE"}"#).unwrap(),
            Decision::scrape("")
        );
        assert_eq!(
            parse_decision(r#"{"action": "fail", "details": {"reason": "stuck"}}"#).unwrap(),
            Decision::fail("stuck")
        );
    }

    #[test]
    fn null_reason_and_url_are_treated_as_absent() {
        assert_eq!(
            parse_decision(r#"{"action": "scrape", "details": {"reason": null}}"#).unwrap(),
            Decision::scrape("")
        );
        assert_eq!(
            parse_decision(
                r#"{"action": "navigate", "details": {"ai_id": "ai-id-0", "url": null, "reason": null}}"#
            )
            .unwrap(),
            Decision::navigate_to_element("ai-id-0", "")
        );
    }
}
