//! Prompt builders for the decision and extraction oracles.

use crate::types::ElementDescriptor;

fn build_user_instructions_string(user_instructions: Option<&str>) -> Option<String> {
    let instructions = user_instructions?.trim();
    if instructions.is_empty() {
        return None;
    }

    Some(format!(
        "\n\n# Custom Instructions Provided by the User\n\nPlease keep the user's instructions in mind when choosing an action or extracting data. If the user's instructions are not relevant to the current task, ignore them.\n\nUser Instructions:\n{instructions}"
    ))
}

pub fn build_decide_system_prompt(user_instructions: Option<&str>) -> String {
    let base = "You are an intelligent web navigation assistant. You will be given:\n1. the user's goal\n2. the URL of the current page\n3. a JSON list of the interactive elements on that page, each with an `ai_id`\n\nChoose exactly ONE next action:\n- \"navigate\": a link should be followed to get closer to the goal.\n- \"scrape\": this page already holds the details the goal asks for and is ready for extraction.\n- \"fail\": no sensible next step exists.\n\nRespond with a single valid JSON object of this shape:\n{\n  \"action\": \"navigate\" | \"scrape\" | \"fail\",\n  \"details\": {\n    \"ai_id\": \"ai-id-of-element-to-follow\",\n    \"url\": \"url-to-navigate-to\",\n    \"reason\": \"short reason for the choice\"\n  }\n}\n\n- For \"navigate\", `details` must contain `ai_id`, `url` and `reason`.\n- For \"scrape\" and \"fail\", `details` only needs `reason`.\n- Pick the element most relevant to the goal.";

    match build_user_instructions_string(user_instructions) {
        Some(extra) => format!("{base}{extra}"),
        None => base.to_string(),
    }
}

pub fn build_decide_user_message(
    goal: &str,
    current_url: &str,
    elements: &[ElementDescriptor],
) -> String {
    let element_map = serde_json::to_string_pretty(elements).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Goal: \"{goal}\"\nCurrent URL: \"{current_url}\"\n\nInteractive elements on the page:\n{element_map}"
    )
}

pub fn build_extract_system_prompt(user_instructions: Option<&str>) -> String {
    let base = "You are a meticulous web scraper. Extract every piece of information relevant to the user's goal from the HTML you are given.\n\nRespond with a single valid JSON value, normally an object, or an array when the goal asks for a list of items. Keep the structure consistent and use null for any field that is not present on the page.";

    match build_user_instructions_string(user_instructions) {
        Some(extra) => format!("{base}{extra}"),
        None => base.to_string(),
    }
}

pub fn build_extract_user_message(goal: &str, html: &str) -> String {
    format!("Scraping goal: \"{goal}\"\n\nHTML:\n---\n{html}\n---")
}
