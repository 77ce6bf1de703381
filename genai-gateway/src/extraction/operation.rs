//! Operation view over a recovered `{result, operacion}` object.

use super::fallback::Extractor;
use super::{Extraction, ExtractionFailure, ExtractionMethod, Flagged};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// The `/query` contract: the model answers with generated HTML in `result`
/// and a description of what it did in `operacion`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub result: Value,
    pub operation: Value,
    /// Same value as `result`, kept for clients that read the HTML directly.
    pub html: Value,
    pub method: ExtractionMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Completed(OperationResult),
    Failed(ExtractionFailure),
}

impl OperationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            OperationOutcome::Completed(result) => result.method.as_str(),
            OperationOutcome::Failed(_) => "failed",
        }
    }
}

impl Serialize for OperationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OperationOutcome::Completed(body) => Flagged {
                success: true,
                body,
            }
            .serialize(serializer),
            OperationOutcome::Failed(body) => Flagged {
                success: false,
                body,
            }
            .serialize(serializer),
        }
    }
}

/// Renames `operacion` to `operation` and mirrors `result` into `html`.
/// Missing fields become `null`; failures pass through.
pub fn project_operation(extraction: Extraction) -> OperationOutcome {
    match extraction {
        Extraction::Recovered(recovered) => {
            let field = |name: &str| recovered.data.get(name).cloned().unwrap_or(Value::Null);
            let result = field("result");
            OperationOutcome::Completed(OperationResult {
                html: result.clone(),
                result,
                operation: field("operacion"),
                method: recovered.method,
            })
        }
        Extraction::Failed(failure) => OperationOutcome::Failed(failure),
    }
}

/// Extract with the default extractor, then project.
pub fn process_operation(raw: &str) -> OperationOutcome {
    project_operation(Extractor::default().extract(raw))
}

/// The generated HTML of an operation response, if any.
///
/// Non-string values are rendered as JSON text.
pub fn extract_html(raw: &str) -> Option<String> {
    match process_operation(raw) {
        OperationOutcome::Completed(result) => match result.html {
            Value::Null => None,
            Value::String(html) => Some(html),
            other => Some(other.to_string()),
        },
        OperationOutcome::Failed(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{extract, Diagnostics};
    use serde_json::json;

    const FORM_RESPONSE: &str = "```json\n{\n  \"result\": \"<!DOCTYPE html>\\n<html lang=\\\"es\\\">\\n<body>\\n<form></form>\\n</body>\\n</html>\\n\",\n  \"operacion\": \"Generación de un formulario HTML con estilos Tailwind CSS.\"\n}\n```";

    #[test]
    fn projects_result_and_operacion() {
        let outcome = process_operation(FORM_RESPONSE);
        let OperationOutcome::Completed(result) = outcome else {
            panic!("expected completed operation");
        };

        assert!(result.result.as_str().unwrap().starts_with("<!DOCTYPE html>\n<html lang=\"es\">"));
        assert_eq!(result.html, result.result);
        assert_eq!(
            result.operation,
            json!("Generación de un formulario HTML con estilos Tailwind CSS.")
        );
        assert_eq!(result.method, ExtractionMethod::Direct);
    }

    #[test]
    fn missing_fields_become_null() {
        let OperationOutcome::Completed(result) = project_operation(extract("{\"other\": 1}"))
        else {
            panic!("expected completed operation");
        };
        assert_eq!(result.result, Value::Null);
        assert_eq!(result.operation, Value::Null);
    }

    #[test]
    fn failures_pass_through_unchanged() {
        let failure = ExtractionFailure {
            error: "boom".to_string(),
            diagnostics: Diagnostics::new("abc", "abc"),
        };
        assert_eq!(
            project_operation(Extraction::Failed(failure.clone())),
            OperationOutcome::Failed(failure)
        );
    }

    #[test]
    fn serializes_the_client_shape() {
        let value = serde_json::to_value(process_operation(
            "{\"result\": \"<p>hi</p>\", \"operacion\": \"2+2\"}",
        ))
        .unwrap();

        assert_eq!(
            value,
            json!({
                "success": true,
                "result": "<p>hi</p>",
                "operation": "2+2",
                "html": "<p>hi</p>",
                "method": "direct"
            })
        );
    }

    #[test]
    fn html_helper() {
        assert_eq!(
            extract_html("{\"result\": \"<b>x</b>\", \"operacion\": \"bold\"}").as_deref(),
            Some("<b>x</b>")
        );
        assert_eq!(extract_html("{\"result\": 4}").as_deref(), Some("4"));
        assert_eq!(extract_html("{\"operacion\": \"none\"}"), None);
        assert_eq!(extract_html("no json at all"), None);
    }
}
