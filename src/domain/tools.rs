//! Demonstration tools: text echo plus per-session key/value memory

use serde_json::{json, Value};

use crate::tools::{RegisteredTool, RegistryError, ToolBuilder, ToolError, ToolRegistry};

crate::wire_enum! {
    pub enum LetterCase {
        Upper => "upper",
        Lower => "lower",
        Unchanged => "unchanged",
    }
}

const ECHO_TEXT_DOC: &str = "Echo text back, optionally changing its letter case.

    Args:
        text: Text to echo
        letter_case: Case conversion to apply before echoing
";

const REMEMBER_VALUE_DOC: &str = "Store a value in the calling session.

    Args:
        key: Name to store the value under
        value: Value to store

    Returns:
        A confirmation message.
";

const RECALL_VALUE_DOC: &str = "Read a value previously stored in the calling session.

    Args:
        key: Name the value was stored under
";

pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(echo_text())?;
    registry.register(remember_value())?;
    registry.register(recall_value())?;
    Ok(())
}

pub fn echo_text() -> RegisteredTool {
    ToolBuilder::new("echo_text")
        .doc(ECHO_TEXT_DOC)
        .param::<String>("text")
        .enum_param::<LetterCase>("letter_case")
        .handler(|args, _ctx| async move {
            let text: String = args.value("text")?;
            let echoed = match args.enum_value::<LetterCase>("letter_case")? {
                LetterCase::Upper => text.to_uppercase(),
                LetterCase::Lower => text.to_lowercase(),
                LetterCase::Unchanged => text,
            };
            Ok(Value::String(echoed))
        })
}

pub fn remember_value() -> RegisteredTool {
    ToolBuilder::new("remember_value")
        .doc(REMEMBER_VALUE_DOC)
        .param::<String>("key")
        .param::<String>("value")
        .handler(|args, ctx| async move {
            let key: String = args.value("key")?;
            let value: String = args.value("value")?;
            let mut data = ctx.session_data().await?;
            data.insert(key.clone(), Value::String(value));
            ctx.update_session_data(data).await?;
            Ok(Value::String(format!("Stored {key}")))
        })
}

pub fn recall_value() -> RegisteredTool {
    ToolBuilder::new("recall_value")
        .doc(RECALL_VALUE_DOC)
        .param::<String>("key")
        .handler(|args, ctx| async move {
            let key: String = args.value("key")?;
            let data = ctx.session_data().await?;
            match data.get(&key) {
                Some(value) => Ok(json!(value)),
                None => Err(ToolError::failed(format!("nothing stored under {key}"))),
            }
        })
}
