// Email Domain Model & Templates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of an `email_queue` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTask {
    pub to: String,
    pub subject: String,
    pub template: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Fully rendered message handed to the email sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Built-in templates: (name, html body)
const TEMPLATES: &[(&str, &str)] = &[
    (
        "payment_confirmation",
        "<h1>Payment received</h1>\
         <p>We have received your payment of {{amount}} {{currency}}.</p>\
         <p>Payment reference: {{payment_id}}</p>",
    ),
    (
        "appointment_confirmation",
        "<h1>Your appointment is booked</h1>\
         <p>{{service_name}} on {{date}} at {{time}}.</p>\
         <p>Specialist: {{specialist_name}}</p>",
    ),
    (
        "appointment_reminder",
        "<h1>Appointment reminder</h1>\
         <p>This is a reminder about your appointment on {{date}} at {{time}}.</p>",
    ),
    (
        "appointment_cancelled",
        "<h1>Appointment cancelled</h1>\
         <p>Your appointment on {{date}} at {{time}} has been cancelled.</p>",
    ),
];

/// Look up a built-in template body by name
pub fn find_template(name: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(template_name, _)| *template_name == name)
        .map(|(_, body)| *body)
}

/// Substitute `{{key}}` placeholders by literal key lookup (single pass).
///
/// Placeholders without a matching variable are left untouched, and
/// substituted values are never re-scanned.
pub fn substitute(template: &str, variables: &Map<String, Value>) -> String {
    substitute_with(template, variables, |text| text.to_string())
}

/// Like [`substitute`], but values are HTML-escaped for the html body
pub fn substitute_html(template: &str, variables: &Map<String, Value>) -> String {
    substitute_with(template, variables, handlebars::html_escape)
}

fn substitute_with<F>(template: &str, variables: &Map<String, Value>, encode: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = &after[..end];
        match variables.get(key) {
            Some(value) => out.push_str(&encode(&value_to_text(value))),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Bodies (html, text) used when the requested template does not exist
fn generic_bodies(task: &EmailTask) -> (String, String) {
    let mut html = format!("<h1>{}</h1>", handlebars::html_escape(&task.subject));
    let mut text = task.subject.clone();
    if !task.variables.is_empty() {
        html.push_str("<ul>");
        for (key, value) in &task.variables {
            let value = value_to_text(value);
            html.push_str(&format!(
                "<li>{}: {}</li>",
                handlebars::html_escape(key),
                handlebars::html_escape(&value)
            ));
            text.push_str(&format!("\n{}: {}", key, value));
        }
        html.push_str("</ul>");
    }
    (html, text)
}

/// Crude tag stripper for the plain-text alternative.
///
/// Runs on template markup only, before values are substituted.
fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                if !text.ends_with('\n') && !text.is_empty() {
                    text.push('\n');
                }
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.trim().to_string()
}

impl EmailTask {
    /// Render into an outgoing message. Unknown template names fall back to a
    /// generic body instead of failing.
    pub fn render(&self) -> OutgoingEmail {
        let (html_body, text_body) = match find_template(&self.template) {
            Some(template) => (
                substitute_html(template, &self.variables),
                substitute(&html_to_text(template), &self.variables),
            ),
            None => {
                tracing::warn!(
                    template = %self.template,
                    "Unknown email template, using generic body"
                );
                generic_bodies(self)
            }
        };

        OutgoingEmail {
            to: self.to.clone(),
            subject: self.subject.clone(),
            html_body,
            text_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(template: &str, variables: Value) -> EmailTask {
        serde_json::from_value(json!({
            "to": "a@b.com",
            "subject": "S",
            "template": template,
            "variables": variables,
        }))
        .unwrap()
    }

    #[test]
    fn test_render_known_template() {
        let email = task(
            "payment_confirmation",
            json!({"amount": 100, "currency": "RUB", "payment_id": "p-42"}),
        )
        .render();

        assert_eq!(email.to, "a@b.com");
        assert_eq!(email.subject, "S");
        assert!(email.html_body.contains("100 RUB"));
        assert!(email.html_body.contains("p-42"));
        assert!(!email.html_body.contains("{{amount}}"));
        assert!(email.text_body.contains("100 RUB"));
        assert!(!email.text_body.contains('<'));
    }

    #[test]
    fn test_render_unknown_template_falls_back() {
        let email = task("does_not_exist", json!({"date": "2024-05-01"})).render();

        assert!(email.html_body.starts_with("<h1>S</h1>"));
        assert!(email.html_body.contains("date: 2024-05-01"));
    }

    #[test]
    fn test_missing_variable_left_in_place() {
        let email = task("payment_confirmation", json!({"amount": 5})).render();
        assert!(email.html_body.contains("5 {{currency}}"));
    }

    #[test]
    fn test_values_are_escaped_in_html_only() {
        let email = task(
            "appointment_confirmation",
            json!({"service_name": "<b>Massage</b> & spa", "date": "2024-05-01"}),
        )
        .render();

        assert!(email
            .html_body
            .contains("&lt;b&gt;Massage&lt;/b&gt; &amp; spa on 2024-05-01"));
        assert!(!email.html_body.contains("<b>"));
        assert!(email.text_body.contains("<b>Massage</b> & spa on 2024-05-01"));
    }

    #[test]
    fn test_generic_body_escapes_subject_and_values() {
        let mut email_task = task("does_not_exist", json!({"note": "<script>x</script>"}));
        email_task.subject = "Hi <there>".to_string();
        let email = email_task.render();

        assert!(email.html_body.starts_with("<h1>Hi &lt;there&gt;</h1>"));
        assert!(!email.html_body.contains("<script>"));
        assert!(email.text_body.starts_with("Hi <there>"));
        assert!(email.text_body.contains("note: <script>x</script>"));
    }

    #[test]
    fn test_substitute_is_literal() {
        let mut vars = Map::new();
        vars.insert("a".to_string(), json!("x{{b}}"));
        vars.insert("b".to_string(), json!(true));

        let out = substitute("{{a}}|{{b}}|{{c}}", &vars);
        assert_eq!(out, "x{{b}}|true|{{c}}");
    }
}
