//! System prompts sent to chat-completion models.

pub(super) const OUTLINE_SYSTEM_PROMPT: &str = "\
You are a presentation structure design expert.
Generate a reasonable presentation outline for the user's request.
Output pure JSON only, without Markdown fences, following exactly this schema:
{
  \"main_topic\": \"string\",
  \"outline\": [{\"sub_topic\": \"string\", \"topic1\": \"string\", \"topic2\": \"string\"}],
  \"summary_topic\": \"string\"
}";

pub(super) const CONTENT_SYSTEM_PROMPT: &str = "\
You are a presentation content writer.
Expand the given outline into complete slides for the user's request.
Output pure JSON only, without Markdown fences, following exactly this schema:
{
  \"title\": \"string\",
  \"slides\": [{
    \"slide_type\": \"title | content | two_column\",
    \"title\": \"string\",
    \"subtitle\": \"string (title slides)\",
    \"content\": [\"string\"] ,
    \"left_content\": [\"string\"],
    \"right_content\": [\"string\"]
  }]
}
Start with one title slide, give every outline section its own slide,
and finish with a summary slide. Write real, descriptive text; never leave fields empty.";

/// Removes a surrounding Markdown code fence, if the model added one anyway.
pub(super) fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn keeps_plain_reply() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
