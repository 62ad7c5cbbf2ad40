use chrono::NaiveDate;

/// Returns the system prompt for a conversation held on `today`.
pub fn system_prompt(today: NaiveDate) -> String {
    include_str!("./system_prompt.md")
        .replace("{{TODAY}}", &today.format("%Y-%m-%d").to_string())
}
