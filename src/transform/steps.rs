//! Transform steps
//!
//! The declared step vocabulary for the combined overview endpoint. Every
//! step is pure: it reads the current composite by reference and returns a
//! new derived value.

use serde_json::{json, Value};
use std::sync::Arc;

use super::context::CLOCK;
use super::error::StepError;
use super::pipeline::BoundUtilities;

/// A named, side-effect-free transformation over the composite object.
pub trait TransformStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, input: &Value, utilities: &BoundUtilities) -> Result<Value, StepError>;
}

/// Embeds into each post the user record whose `id` matches the post's
/// `userId`, under an `author` key. Posts without a matching user get an
/// explicit null author.
pub struct AttachAuthors;

impl TransformStep for AttachAuthors {
    fn name(&self) -> &'static str {
        "attach_authors"
    }

    fn apply(&self, input: &Value, _utilities: &BoundUtilities) -> Result<Value, StepError> {
        let users = expect_collection(input, "users")?;
        let posts = expect_collection(input, "posts")?;

        let enriched: Vec<Value> = posts
            .iter()
            .map(|post| {
                let author = post
                    .get("userId")
                    .and_then(|user_id| users.iter().find(|user| user.get("id") == Some(user_id)));
                let mut out = post.clone();
                if let Some(object) = out.as_object_mut() {
                    object.insert(
                        "author".to_string(),
                        author.cloned().unwrap_or(Value::Null),
                    );
                }
                out
            })
            .collect();

        let mut result = input.clone();
        result
            .as_object_mut()
            .ok_or_else(|| StepError::UnexpectedShape("composite is not an object".to_string()))?
            .insert("posts".to_string(), Value::Array(enriched));
        Ok(result)
    }
}

/// Adds a `meta` object with record counts for both collections.
pub struct Summarize;

impl TransformStep for Summarize {
    fn name(&self) -> &'static str {
        "summarize"
    }

    fn apply(&self, input: &Value, _utilities: &BoundUtilities) -> Result<Value, StepError> {
        let user_count = expect_collection(input, "users")?.len();
        let post_count = expect_collection(input, "posts")?.len();

        let mut result = input.clone();
        result
            .as_object_mut()
            .ok_or_else(|| StepError::UnexpectedShape("composite is not an object".to_string()))?
            .insert(
                "meta".to_string(),
                json!({"user_count": user_count, "post_count": post_count}),
            );
        Ok(result)
    }
}

/// Sets `meta.generated_at` from the injected clock utility.
pub struct Stamp;

impl TransformStep for Stamp {
    fn name(&self) -> &'static str {
        "stamp"
    }

    fn apply(&self, input: &Value, utilities: &BoundUtilities) -> Result<Value, StepError> {
        let now = utilities.get(CLOCK)?.call("now", &[])?;

        let mut result = input.clone();
        let object = result
            .as_object_mut()
            .ok_or_else(|| StepError::UnexpectedShape("composite is not an object".to_string()))?;

        match object.get_mut("meta").and_then(Value::as_object_mut) {
            Some(meta) => {
                meta.insert("generated_at".to_string(), now);
            }
            None => {
                object.insert("meta".to_string(), json!({"generated_at": now}));
            }
        }
        Ok(result)
    }
}

/// The fixed step list for the combined endpoint, in declaration order.
pub fn overview_steps() -> Vec<Arc<dyn TransformStep>> {
    vec![Arc::new(AttachAuthors), Arc::new(Summarize), Arc::new(Stamp)]
}

fn expect_collection<'a>(input: &'a Value, name: &str) -> Result<&'a Vec<Value>, StepError> {
    input
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| StepError::UnexpectedShape(format!("missing '{name}' collection")))
}
